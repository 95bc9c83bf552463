/// Emits a `tracing::debug!` event only when the first argument is true.
#[macro_export]
macro_rules! debug_if {
    ($enabled:expr, $($arg:tt)+) => {
        {
            if $enabled {
                tracing::debug!($($arg)+)
            }
        }
    };
}
