use crate::error::FrameError;

/// Receives the outcome of every command exchange.
///
/// `response` is the full response on success, or whatever partial text was
/// read before `error` occurred.
pub trait ExchangeObserver {
    fn on_exchange_complete(&mut self, command: &str, response: &str, error: Option<&FrameError>);
}

/// Discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ExchangeObserver for NoopObserver {
    fn on_exchange_complete(
        &mut self,
        _command: &str,
        _response: &str,
        _error: Option<&FrameError>,
    ) {
    }
}

/// Report an exchange result to `observer`, passing partial text on failure.
pub fn notify<O>(observer: &mut O, command: &str, result: &crate::Result<String>)
where
    O: ExchangeObserver + ?Sized,
{
    match result {
        Ok(response) => observer.on_exchange_complete(command, response, None),
        Err(err) => {
            let partial = err.partial_response().unwrap_or_default();
            observer.on_exchange_complete(command, &partial, Some(err));
        }
    }
}
