//! Capability-driven eligibility predicate.
//!
//! A factory declares what it can render (platform, installed browsers with
//! their plugins, screen widths, color depths, media players). A job matches
//! when every option it requests is either unset or within that declaration.
//!
//! The predicate is plain data: the store renders it into a parameterized
//! query, and [`EligibilityPredicate::matching_browser`] evaluates the same
//! rules in memory.

use crate::types::DbId;

// ---------------------------------------------------------------------------
// Declared capabilities
// ---------------------------------------------------------------------------

/// One browser installed on a factory, with the plugins available in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserCapability {
    pub browser_id: DbId,
    pub browser_group: String,
    pub major: Option<i32>,
    pub minor: Option<i32>,
    pub javascript: Option<String>,
    pub java: Option<String>,
    pub flash: Option<String>,
}

/// Everything a factory declares it can service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub factory_id: DbId,
    pub platform: String,
    pub browsers: Vec<BrowserCapability>,
    pub screen_widths: Vec<i32>,
    pub color_depths: Vec<i32>,
    pub media: Vec<String>,
}

/// The resolved configuration a job asks for (job row joined with its group).
///
/// `None` always means "don't care".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    pub platform: Option<String>,
    pub browser_group: String,
    pub major: Option<i32>,
    pub minor: Option<i32>,
    pub width: Option<i32>,
    pub bits_per_pixel: Option<i32>,
    pub javascript: Option<String>,
    pub java: Option<String>,
    pub flash: Option<String>,
    pub media: Option<String>,
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

/// Text-valued job or group columns that factory-level conditions apply to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextColumn {
    Platform,
    Media,
}

/// Integer-valued group columns that factory-level conditions apply to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntColumn {
    Width,
    BitsPerPixel,
}

impl TextColumn {
    /// Qualified column name in the eligibility query (`j` = jobs, `g` = request_groups).
    pub fn sql(self) -> &'static str {
        match self {
            TextColumn::Platform => "j.platform",
            TextColumn::Media => "g.media",
        }
    }

    fn value(self, req: &Requirements) -> Option<&str> {
        match self {
            TextColumn::Platform => req.platform.as_deref(),
            TextColumn::Media => req.media.as_deref(),
        }
    }
}

impl IntColumn {
    pub fn sql(self) -> &'static str {
        match self {
            IntColumn::Width => "g.width",
            IntColumn::BitsPerPixel => "g.bits_per_pixel",
        }
    }

    fn value(self, req: &Requirements) -> Option<i32> {
        match self {
            IntColumn::Width => req.width,
            IntColumn::BitsPerPixel => req.bits_per_pixel,
        }
    }
}

/// A single "unset or acceptable" test on one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `column IS NULL OR column = value`
    TextEquals { column: TextColumn, value: String },
    /// `column IS NULL OR column = ANY(values)`
    TextIn { column: TextColumn, values: Vec<String> },
    /// `column IS NULL OR column = ANY(values)`
    IntIn { column: IntColumn, values: Vec<i32> },
}

impl Condition {
    /// Evaluate this condition against a job's requirements.
    pub fn holds(&self, req: &Requirements) -> bool {
        match self {
            Condition::TextEquals { column, value } => {
                column.value(req).map_or(true, |v| v == value)
            }
            Condition::TextIn { column, values } => {
                column.value(req).map_or(true, |v| values.iter().any(|x| x == v))
            }
            Condition::IntIn { column, values } => {
                column.value(req).map_or(true, |v| values.contains(&v))
            }
        }
    }
}

/// True when `browser` can render a job asking for `req`.
///
/// Family must match; version and plugin fields match when unset on the job.
pub fn browser_matches(browser: &BrowserCapability, req: &Requirements) -> bool {
    fn unset_or_eq<T: PartialEq>(wanted: &Option<T>, have: &Option<T>) -> bool {
        wanted.is_none() || wanted == have
    }

    browser.browser_group == req.browser_group
        && unset_or_eq(&req.major, &browser.major)
        && unset_or_eq(&req.minor, &browser.minor)
        && unset_or_eq(&req.javascript, &browser.javascript)
        && unset_or_eq(&req.java, &browser.java)
        && unset_or_eq(&req.flash, &browser.flash)
}

// ---------------------------------------------------------------------------
// Predicate
// ---------------------------------------------------------------------------

/// The full eligibility test for one factory's poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EligibilityPredicate {
    pub factory_id: DbId,
    pub conditions: Vec<Condition>,
    /// Browsers to try, in ascending id order.
    pub browsers: Vec<BrowserCapability>,
    /// Jobs skipped regardless of other conditions (lost claim races).
    pub excluded_jobs: Vec<DbId>,
}

impl EligibilityPredicate {
    /// Build the predicate from a factory's declared capabilities.
    pub fn for_factory(caps: &Capabilities) -> Self {
        let mut browsers = caps.browsers.clone();
        browsers.sort_by_key(|b| b.browser_id);

        Self {
            factory_id: caps.factory_id,
            conditions: Vec::new(),
            browsers,
            excluded_jobs: Vec::new(),
        }
        .with(Condition::TextEquals {
            column: TextColumn::Platform,
            value: caps.platform.clone(),
        })
        .with(Condition::IntIn {
            column: IntColumn::Width,
            values: caps.screen_widths.clone(),
        })
        .with(Condition::IntIn {
            column: IntColumn::BitsPerPixel,
            values: caps.color_depths.clone(),
        })
        .with(Condition::TextIn {
            column: TextColumn::Media,
            values: caps.media.clone(),
        })
    }

    /// Add a condition.
    pub fn with(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Skip a job from now on.
    pub fn exclude(&mut self, job_id: DbId) {
        if !self.excluded_jobs.contains(&job_id) {
            self.excluded_jobs.push(job_id);
        }
    }

    pub fn browser_ids(&self) -> Vec<DbId> {
        self.browsers.iter().map(|b| b.browser_id).collect()
    }

    /// The first browser that can render `req`, if every factory-level
    /// condition holds.
    pub fn matching_browser(&self, req: &Requirements) -> Option<&BrowserCapability> {
        if !self.conditions.iter().all(|c| c.holds(req)) {
            return None;
        }
        self.browsers.iter().find(|b| browser_matches(b, req))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
