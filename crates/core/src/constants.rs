/// Cache key for the current standings list
pub const CURRENT_STANDINGS_KEY: &str = "stock:current";

/// Cache key for the year-to-date chart series
pub const PERFORMANCE_SERIES_KEY: &str = "stock:monthly";

/// Cache key for the benchmark index list
pub const BENCHMARKS_KEY: &str = "stock:current:indexes";

/// Prefix of the permanent baseline-price entry; the anchor date follows
pub const BASELINE_KEY_PREFIX: &str = "stock:baselinePrices:";

/// Benchmark indexes shown next to the managers (symbol, display name)
pub const BENCHMARK_INDEXES: [(&str, &str); 4] = [
    ("SPY", "S&P 500"),
    ("QQQ", "Nasdaq 100"),
    ("DIA", "Dow Jones"),
    ("DX-Y.NYB", "US Dollar"),
];

/// Default bound on a single upstream call, in seconds
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 8;

/// Decimal places kept on published percentages
pub const PERCENT_PRECISION: u32 = 4;
