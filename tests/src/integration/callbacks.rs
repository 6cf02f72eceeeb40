//! # Callback Scenarios
//!
//! A [`CallbackTarget`](interface_support::CallbackTarget) installed as a
//! target handler fans each message out to its listeners.

#[cfg(test)]
mod tests {
    use crate::integration::{
        add_params, add_response, args, connect, settle, sum_of, within, ADD, PING,
    };
    use interface_support::{
        CallbackRouter, CallbackTarget, EndpointConfig, HandlerResult, InterfaceError,
        InterfaceTarget, Reply,
    };
    use pipe_types::{StructValue, Value};
    use std::cell::RefCell;
    use std::rc::Rc;
    use tokio::task::LocalSet;

    fn add_reply(args: &[Value]) -> HandlerResult {
        let a = args[0].as_i32().unwrap_or_default();
        let b = args[1].as_i32().unwrap_or_default();
        Ok(Some(Reply::immediate(StructValue::new().with("sum", a + b))))
    }

    #[tokio::test]
    async fn test_fire_and_forget_reaches_every_listener() {
        LocalSet::new()
            .run_until(async {
                let router = CallbackRouter::new();
                let callbacks = CallbackTarget::new(&router);
                let seen = Rc::new(RefCell::new(Vec::new()));
                for tag in ["first", "second"] {
                    let seen = seen.clone();
                    callbacks
                        .add_listener(move |args: &[Value]| {
                            seen.borrow_mut().push((tag, args[0].as_i32()));
                            Ok(None)
                        })
                        .unwrap();
                }

                let target = InterfaceTarget::new(EndpointConfig::named("events"));
                target.register_handler(PING, add_params(), None, callbacks.create_target_handler(false));
                let (proxy, binding) = connect(&target).unwrap();

                drop(proxy.send_message(PING, &add_params(), None, args(7, 0)).unwrap());
                settle().await;

                assert_eq!(
                    *seen.borrow(),
                    vec![("first", Some(7)), ("second", Some(7))]
                );
                assert!(target.is_bound(binding));
            })
            .await;
    }

    #[tokio::test]
    async fn test_single_responder_replies() {
        LocalSet::new()
            .run_until(async {
                let router = CallbackRouter::new();
                let callbacks = CallbackTarget::new(&router);
                callbacks.add_listener(|_args: &[Value]| Ok(None)).unwrap();
                callbacks.add_listener(add_reply).unwrap();

                let target = InterfaceTarget::new(EndpointConfig::named("events"));
                target.register_handler(
                    ADD,
                    add_params(),
                    Some(add_response()),
                    callbacks.create_target_handler(true),
                );
                let (proxy, _binding) = connect(&target).unwrap();

                let reply = proxy
                    .send_message(ADD, &add_params(), Some(&add_response()), args(4, 5))
                    .unwrap();
                let value = within(reply).await.unwrap().unwrap().unwrap();
                assert_eq!(sum_of(&value), Some(9));
            })
            .await;
    }

    #[tokio::test]
    async fn test_multiple_responders_close_binding() {
        LocalSet::new()
            .run_until(async {
                let router = CallbackRouter::new();
                let callbacks = CallbackTarget::new(&router);
                callbacks.add_listener(add_reply).unwrap();
                callbacks.add_listener(add_reply).unwrap();

                let target = InterfaceTarget::new(EndpointConfig::named("events"));
                target.register_handler(
                    ADD,
                    add_params(),
                    Some(add_response()),
                    callbacks.create_target_handler(true),
                );
                let (proxy, binding) = connect(&target).unwrap();

                let reply = proxy
                    .send_message(ADD, &add_params(), Some(&add_response()), args(1, 1))
                    .unwrap();
                assert!(matches!(
                    within(reply).await.unwrap(),
                    Err(InterfaceError::Disconnected { .. })
                ));
                assert!(!target.is_bound(binding));
            })
            .await;
    }

    #[tokio::test]
    async fn test_removed_listener_stops_receiving() {
        LocalSet::new()
            .run_until(async {
                let router = CallbackRouter::new();
                let callbacks = CallbackTarget::new(&router);
                let hits = Rc::new(RefCell::new(0));
                let counter = hits.clone();
                let id = callbacks
                    .add_listener(move |_args: &[Value]| {
                        *counter.borrow_mut() += 1;
                        Ok(None)
                    })
                    .unwrap();

                let target = InterfaceTarget::new(EndpointConfig::named("events"));
                target.register_handler(PING, add_params(), None, callbacks.create_target_handler(false));
                let (proxy, _binding) = connect(&target).unwrap();

                drop(proxy.send_message(PING, &add_params(), None, args(1, 1)).unwrap());
                settle().await;
                assert!(router.remove_listener(id));
                drop(proxy.send_message(PING, &add_params(), None, args(2, 2)).unwrap());
                settle().await;

                assert_eq!(*hits.borrow(), 1);
                assert_eq!(router.listener_count(), 0);
            })
            .await;
    }
}
