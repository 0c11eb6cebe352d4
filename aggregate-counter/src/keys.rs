use chrono::{DateTime, Datelike, Timelike, Utc};

pub const DEFAULT_KEY_PREFIX: &str = "aggregatecounters";

/// Every key a counter store writes lives under one prefix, in one of four namespaces:
///
/// * `{prefix}:buckets:{name}:{suffix}` hashes of per-unit counts
/// * `{prefix}:total:{name}` the flat all-time count
/// * `{prefix}:keys:{name}` the set of bucket keys ever written for `name`
/// * `{prefix}:names` the set of all counter names
///
/// A bucket suffix never contains `:`, so counter names containing `:` cannot collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        KeySpace {
            prefix: prefix.into(),
        }
    }

    pub fn total_key(&self, name: &str) -> String {
        format!("{}:total:{}", self.prefix, name)
    }

    pub fn bookkeeping_key(&self, name: &str) -> String {
        format!("{}:keys:{}", self.prefix, name)
    }

    pub fn names_key(&self) -> String {
        format!("{}:names", self.prefix)
    }

    pub fn years_key(&self, name: &str) -> String {
        format!("{}:years", self.bucket_base(name))
    }

    pub fn generator(&self, name: &str, at: DateTime<Utc>) -> AggregateKeyGenerator {
        AggregateKeyGenerator::new(self.bucket_base(name), at)
    }

    fn bucket_base(&self, name: &str) -> String {
        format!("{}:buckets:{}", self.prefix, name)
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        KeySpace::new(DEFAULT_KEY_PREFIX)
    }
}

/// The five nested bucket keys of one counter at one instant, with the field each
/// bucket uses for that instant.
#[derive(Debug, Clone)]
pub struct AggregateKeyGenerator {
    base: String,
    at: DateTime<Utc>,
}

impl AggregateKeyGenerator {
    fn new(base: String, at: DateTime<Utc>) -> Self {
        AggregateKeyGenerator { base, at }
    }

    pub fn years_key(&self) -> String {
        format!("{}:years", self.base)
    }

    pub fn year_key(&self) -> String {
        format!("{}:{:04}", self.base, self.at.year())
    }

    pub fn month_key(&self) -> String {
        format!("{}:{:04}{:02}", self.base, self.at.year(), self.at.month())
    }

    pub fn day_key(&self) -> String {
        format!(
            "{}:{:04}{:02}{:02}",
            self.base,
            self.at.year(),
            self.at.month(),
            self.at.day()
        )
    }

    pub fn hour_key(&self) -> String {
        format!(
            "{}:{:04}{:02}{:02}{:02}",
            self.base,
            self.at.year(),
            self.at.month(),
            self.at.day(),
            self.at.hour()
        )
    }

    pub fn year(&self) -> String {
        self.at.year().to_string()
    }

    /// 1-12
    pub fn month(&self) -> String {
        self.at.month().to_string()
    }

    /// 1-31
    pub fn day(&self) -> String {
        self.at.day().to_string()
    }

    /// 0-23
    pub fn hour(&self) -> String {
        self.at.hour().to_string()
    }

    /// 0-59
    pub fn minute(&self) -> String {
        self.at.minute().to_string()
    }

    /// `(bucket key, field)` pairs from the coarsest bucket to the finest.
    pub fn levels(&self) -> [(String, String); 5] {
        [
            (self.years_key(), self.year()),
            (self.year_key(), self.month()),
            (self.month_key(), self.day()),
            (self.day_key(), self.hour()),
            (self.hour_key(), self.minute()),
        ]
    }
}
