//! # Reply Ordering
//!
//! Replies may arrive in any order; each caller must still receive the
//! reply carrying its own request id.

#[cfg(test)]
mod tests {
    use crate::integration::{
        add_params, add_response, args, connect_raw, read_header, sum_of, within, write_reply, ADD,
    };
    use futures::future::join_all;
    use proptest::prelude::*;
    use tokio::task::LocalSet;

    /// Send `order.len()` requests, answer them in `order` and return the
    /// sum each caller received.
    fn run_with_reply_order(order: Vec<u64>) -> Vec<Option<i32>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        LocalSet::new().block_on(&runtime, async move {
            let (proxy, peer) = connect_raw().unwrap();
            let replies: Vec<_> = (0..order.len())
                .map(|i| {
                    proxy
                        .send_message(ADD, &add_params(), Some(&add_response()), args(i as i32, 0))
                        .unwrap()
                })
                .collect();
            for expected in 0..order.len() as u64 {
                assert_eq!(read_header(&peer).unwrap().request_id, expected);
            }

            for request_id in &order {
                write_reply(&peer, ADD, *request_id, *request_id as i32 * 10).unwrap();
            }

            within(join_all(replies))
                .await
                .unwrap()
                .into_iter()
                .map(|result| sum_of(&result.unwrap().unwrap()))
                .collect()
        })
    }

    #[test]
    fn test_reversed_replies() {
        let sums = run_with_reply_order(vec![2, 1, 0]);
        assert_eq!(sums, vec![Some(0), Some(10), Some(20)]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_any_reply_order_reaches_its_caller(
            order in (1usize..8)
                .prop_flat_map(|n| Just((0..n as u64).collect::<Vec<_>>()).prop_shuffle())
        ) {
            let n = order.len();
            let sums = run_with_reply_order(order);
            let expected: Vec<_> = (0..n as i32).map(|i| Some(i * 10)).collect();
            prop_assert_eq!(sums, expected);
        }
    }
}
