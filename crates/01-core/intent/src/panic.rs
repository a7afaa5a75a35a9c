use std::any::Any;

/// Text carried by a caught panic payload.
///
/// Takes the payload by value so the message is read from the boxed value,
/// not from the box.
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(msg) => *msg,
        Err(payload) => match payload.downcast_ref::<&'static str>() {
            Some(msg) => (*msg).to_string(),
            None => "unknown panic".to_string(),
        },
    }
}
