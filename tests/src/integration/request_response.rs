//! # Request/Response Scenarios
//!
//! Requests from proxies reach target handlers and replies find their way
//! back to the right caller.

#[cfg(test)]
mod tests {
    use crate::integration::{
        add_params, add_response, args, calculator, connect, connect_raw, read_header, settle,
        sum_of, within, write_reply, ADD, PING,
    };
    use futures::future::join_all;
    use interface_support::{EndpointConfig, InterfaceTarget, Reply};
    use pipe_types::{StructValue, Value};
    use std::cell::Cell;
    use std::rc::Rc;
    use tokio::task::LocalSet;

    #[tokio::test]
    async fn test_add_round_trip() {
        LocalSet::new()
            .run_until(async {
                let target = calculator();
                let (proxy, _binding) = connect(&target).unwrap();

                let reply = proxy
                    .send_message(ADD, &add_params(), Some(&add_response()), args(1, 2))
                    .unwrap();
                let value = within(reply).await.unwrap().unwrap().unwrap();

                assert_eq!(sum_of(&value), Some(3));
                assert_eq!(proxy.next_request_id(), 1);
                assert_eq!(proxy.pending_count(), 0);
            })
            .await;
    }

    #[tokio::test]
    async fn test_scenario_request_zero_resolves() {
        LocalSet::new()
            .run_until(async {
                let (proxy, peer) = connect_raw().unwrap();
                let reply = proxy
                    .send_message(3, &add_params(), Some(&add_response()), args(2, 2))
                    .unwrap();

                let header = read_header(&peer).unwrap();
                assert_eq!((header.ordinal, header.request_id), (3, 0));
                assert!(header.flags.expects_response());

                write_reply(&peer, 3, 0, 4).unwrap();
                let value = within(reply).await.unwrap().unwrap().unwrap();
                assert_eq!(sum_of(&value), Some(4));
            })
            .await;
    }

    #[tokio::test]
    async fn test_concurrent_requests_resolve_each_caller() {
        LocalSet::new()
            .run_until(async {
                let target = calculator();
                let (proxy, _binding) = connect(&target).unwrap();

                let replies: Vec<_> = (0..5)
                    .map(|i| {
                        proxy
                            .send_message(ADD, &add_params(), Some(&add_response()), args(i, 100))
                            .unwrap()
                    })
                    .collect();
                assert_eq!(proxy.pending_count(), 5);

                let results = within(join_all(replies)).await.unwrap();
                for (i, result) in results.into_iter().enumerate() {
                    let value = result.unwrap().unwrap();
                    assert_eq!(sum_of(&value), Some(i as i32 + 100));
                }
            })
            .await;
    }

    #[tokio::test]
    async fn test_deferred_replies_out_of_order() {
        LocalSet::new()
            .run_until(async {
                let target = InterfaceTarget::new(EndpointConfig::named("slow"));
                target.register_handler(ADD, add_params(), Some(add_response()), |args: &[Value]| {
                    let a = args[0].as_i32().unwrap_or_default();
                    let b = args[1].as_i32().unwrap_or_default();
                    // Earlier requests wait longer, so replies come back reversed.
                    let delay = 10 - a;
                    Ok(Some(Reply::deferred(async move {
                        for _ in 0..delay {
                            tokio::task::yield_now().await;
                        }
                        Ok(StructValue::new().with("sum", a + b))
                    })))
                });
                let (proxy, _binding) = connect(&target).unwrap();

                let replies: Vec<_> = (0..5)
                    .map(|i| {
                        proxy
                            .send_message(ADD, &add_params(), Some(&add_response()), args(i, 1))
                            .unwrap()
                    })
                    .collect();

                let results = within(join_all(replies)).await.unwrap();
                let sums: Vec<_> = results
                    .into_iter()
                    .map(|result| sum_of(&result.unwrap().unwrap()))
                    .collect();
                assert_eq!(sums, vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);
            })
            .await;
    }

    #[tokio::test]
    async fn test_multiple_bindings_share_handlers() {
        LocalSet::new()
            .run_until(async {
                let target = calculator();
                let (first, _) = connect(&target).unwrap();
                let (second, _) = connect(&target).unwrap();
                assert_eq!(target.binding_count(), 2);

                let a = first
                    .send_message(ADD, &add_params(), Some(&add_response()), args(1, 1))
                    .unwrap();
                let b = second
                    .send_message(ADD, &add_params(), Some(&add_response()), args(20, 20))
                    .unwrap();

                // Both proxies use request id 0 on their own binding.
                assert_eq!(sum_of(&within(a).await.unwrap().unwrap().unwrap()), Some(2));
                assert_eq!(sum_of(&within(b).await.unwrap().unwrap().unwrap()), Some(40));
            })
            .await;
    }

    #[tokio::test]
    async fn test_fire_and_forget_reaches_handler() {
        LocalSet::new()
            .run_until(async {
                let target = calculator();
                let pings = Rc::new(Cell::new(0));
                let counter = pings.clone();
                target.register_handler(PING, add_params(), None, move |_args: &[Value]| {
                    counter.set(counter.get() + 1);
                    Ok(None)
                });
                let (proxy, binding) = connect(&target).unwrap();

                for i in 0..3 {
                    let sent = proxy
                        .send_message(PING, &add_params(), None, args(i, i))
                        .unwrap()
                        .await;
                    assert_eq!(sent, Ok(None));
                }
                settle().await;

                assert_eq!(pings.get(), 3);
                assert!(target.is_bound(binding));
                assert_eq!(proxy.pending_count(), 0);
            })
            .await;
    }
}
