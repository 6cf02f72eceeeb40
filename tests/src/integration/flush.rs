//! # Flush Scenarios
//!
//! `flush_for_testing` round-trips a control message through the peer, so
//! it resolves only once everything sent before it has been read.

#[cfg(test)]
mod tests {
    use crate::integration::{
        add_params, args, calculator, connect, connect_raw, read_header, settle, within, PING,
    };
    use futures::FutureExt;
    use interface_support::{InterfaceError, RUN_MESSAGE_ID};
    use pipe_types::Value;
    use std::cell::Cell;
    use std::rc::Rc;
    use tokio::task::LocalSet;

    #[tokio::test]
    async fn test_flush_waits_for_round_trip() {
        LocalSet::new()
            .run_until(async {
                let target = calculator();
                let (proxy, _binding) = connect(&target).unwrap();

                let mut flushed = proxy.flush_for_testing().unwrap();
                assert!((&mut flushed).now_or_never().is_none());

                assert_eq!(within(flushed).await.unwrap(), Ok(()));
                assert!(proxy.is_bound());
            })
            .await;
    }

    #[tokio::test]
    async fn test_flush_orders_after_earlier_messages() {
        LocalSet::new()
            .run_until(async {
                let target = calculator();
                let seen = Rc::new(Cell::new(0));
                let counter = seen.clone();
                target.register_handler(PING, add_params(), None, move |_args: &[Value]| {
                    counter.set(counter.get() + 1);
                    Ok(None)
                });
                let (proxy, _binding) = connect(&target).unwrap();

                for i in 0..3 {
                    drop(proxy.send_message(PING, &add_params(), None, args(i, i)).unwrap());
                }
                let flushed = proxy.flush_for_testing().unwrap();
                within(flushed).await.unwrap().unwrap();

                assert_eq!(seen.get(), 3);
            })
            .await;
    }

    #[tokio::test]
    async fn test_flush_uses_reserved_ordinal() {
        LocalSet::new()
            .run_until(async {
                let (proxy, peer) = connect_raw().unwrap();
                let _flushed = proxy.flush_for_testing().unwrap();

                let header = read_header(&peer).unwrap();
                assert_eq!(header.ordinal, RUN_MESSAGE_ID);
                assert!(header.flags.expects_response());
            })
            .await;
    }

    #[tokio::test]
    async fn test_pending_flush_settles_on_teardown() {
        LocalSet::new()
            .run_until(async {
                // A raw peer never answers the flush.
                let (proxy, _peer) = connect_raw().unwrap();
                let flushed = proxy.flush_for_testing().unwrap();
                settle().await;

                proxy.close();
                assert_eq!(
                    within(flushed).await.unwrap(),
                    Err(InterfaceError::ConnectionClosed)
                );
            })
            .await;
    }

    #[tokio::test]
    async fn test_flush_after_teardown_fails_fast() {
        LocalSet::new()
            .run_until(async {
                let target = calculator();
                let (proxy, _binding) = connect(&target).unwrap();
                proxy.close();

                let flushed = proxy.flush_for_testing().unwrap();
                assert_eq!(flushed.await, Err(InterfaceError::ConnectionClosed));
            })
            .await;
    }

    #[tokio::test]
    async fn test_flush_on_unbound_proxy() {
        LocalSet::new()
            .run_until(async {
                let (proxy, _peer) = connect_raw().unwrap();
                assert!(proxy.unbind().is_some());

                assert!(matches!(
                    proxy.flush_for_testing(),
                    Err(InterfaceError::NotBound)
                ));
            })
            .await;
    }
}
