mod cancel;
mod debounce;

pub use cancel::CancelErr;
pub use cancel::OrCancelExt;
pub use debounce::DebounceGate;
pub use debounce::Debounced;
