// Copyright (c) 2024 SIGMA ENGINE

/// Emits a `trace` event tagged `sigma_trace:<event>` carrying a JSON payload.
///
/// ```
/// # use sigma_logging::sigma_trace;
/// sigma_trace!("chain.push_block", { "block_num": 12 });
/// ```
#[macro_export]
macro_rules! sigma_trace {
    ($evt:expr, $params:tt) => {
        tracing::trace!("sigma_trace:{}:{}", $evt, serde_json::json!($params));
    };
}
