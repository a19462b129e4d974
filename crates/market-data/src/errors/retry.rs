/// Classification for how a refresh reacts to a provider error.
///
/// # Behavior Summary
///
/// | Class | Further upstream calls this request? | Symbol result |
/// |-------|--------------------------------------|---------------|
/// | `PreferCache` | No | served from cache |
/// | `PerSymbol` | Yes, one call per symbol | `None` if that call fails too |
/// | `Never` | No retry for this symbol | `None` |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// The provider is throttling us. Stop calling it for the rest of the
    /// request and serve cached data instead.
    PreferCache,

    /// Transient or batch-level failure. Retry each symbol individually so
    /// one bad symbol does not sink the others.
    PerSymbol,

    /// The request is fundamentally invalid (unknown symbol, no data,
    /// malformed payload). Retrying won't help.
    Never,
}
