//! Version-gated, forward-only migration planning.
//!
//! Both the JSON config file and the SQLite schema carry a stamped version.
//! A registry lists the versions that introduced a change; [`plan`] selects
//! every step with `stored < step <= current` in ascending order, and the
//! caller stamps `current` once the steps succeed. There is no per-step
//! ledger: steps must be idempotent because the stamp is the only record.

pub mod config;

use anyhow::{Context, Result};
use semver::Version;

/// Version assumed for artifacts written before versions were stamped.
pub const OLDEST_KNOWN_VERSION: &str = "0.1.0";

/// A single registered transform, keyed by the version that introduced it.
pub struct Migration<F> {
    pub version: &'static str,
    pub description: &'static str,
    pub apply: F,
}

/// What needs to happen to bring an artifact to the running version.
pub enum Plan<'a, F> {
    UpToDate,
    Upgrade {
        from: Version,
        to: Version,
        steps: Vec<&'a Migration<F>>,
    },
    /// The artifact was written by a newer binary. Leave it alone.
    Downgrade { stored: Version, current: Version },
}

/// Summary of a completed [`migrate`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    UpToDate,
    Migrated {
        from: String,
        to: String,
        applied: Vec<String>,
    },
    Downgrade { stored: String, current: String },
}

impl MigrationOutcome {
    /// Whether the caller should stamp the artifact with the current version.
    pub fn needs_stamp(&self) -> bool {
        matches!(self, Self::Migrated { .. })
    }
}

/// Parse a version leniently: `"1"`, `"1.2"`, `"v1.2.3"` and full semver are
/// accepted. Pre-release and build metadata are dropped.
pub fn parse_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim().trim_start_matches(['v', 'V']);
    let core = trimmed
        .split(|c: char| c == '-' || c == '+')
        .next()
        .unwrap_or_default();

    let mut parts = core.split('.');
    let major = parts.next()?.parse::<u64>().ok()?;
    let minor = match parts.next() {
        Some(p) => p.parse::<u64>().ok()?,
        None => 0,
    };
    let patch = match parts.next() {
        Some(p) => p.parse::<u64>().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some(Version::new(major, minor, patch))
}

fn key(v: &Version) -> (u64, u64, u64) {
    (v.major, v.minor, v.patch)
}

/// Compute the migration plan for an artifact stamped `stored`.
///
/// `None` (unversioned) is treated as [`OLDEST_KNOWN_VERSION`]. Registry
/// entries with unparseable versions are an error, since that is a bug in
/// the binary rather than in the artifact.
pub fn plan<'a, F>(
    registry: &'a [Migration<F>],
    stored: Option<&str>,
    current: &str,
) -> Result<Plan<'a, F>> {
    let current_v =
        parse_version(current).with_context(|| format!("invalid current version: {current}"))?;
    let stored_raw = stored.unwrap_or(OLDEST_KNOWN_VERSION);
    let stored_v = match parse_version(stored_raw) {
        Some(v) => v,
        None => {
            tracing::warn!(stored = stored_raw, "unparseable stored version, treating as oldest");
            parse_version(OLDEST_KNOWN_VERSION).context("invalid oldest version")?
        }
    };

    if key(&stored_v) > key(&current_v) {
        return Ok(Plan::Downgrade {
            stored: stored_v,
            current: current_v,
        });
    }

    let mut steps = Vec::new();
    for migration in registry {
        let v = parse_version(migration.version)
            .with_context(|| format!("invalid migration version: {}", migration.version))?;
        if key(&v) > key(&stored_v) && key(&v) <= key(&current_v) {
            steps.push((v, migration));
        }
    }
    steps.sort_by(|a, b| key(&a.0).cmp(&key(&b.0)));

    // An older stamp with no matching steps still gets restamped.
    if key(&stored_v) == key(&current_v) && steps.is_empty() {
        return Ok(Plan::UpToDate);
    }

    Ok(Plan::Upgrade {
        from: stored_v,
        to: current_v,
        steps: steps.into_iter().map(|(_, m)| m).collect(),
    })
}

/// A transform over an in-memory artifact.
pub type Step<T> = fn(&mut T) -> Result<()>;

/// Plan and apply migrations to `target`. Stamping is left to the caller.
pub fn migrate<T>(
    target: &mut T,
    registry: &[Migration<Step<T>>],
    stored: Option<&str>,
    current: &str,
) -> Result<MigrationOutcome> {
    match plan(registry, stored, current)? {
        Plan::UpToDate => Ok(MigrationOutcome::UpToDate),
        Plan::Downgrade { stored, current } => {
            tracing::warn!(
                %stored,
                %current,
                "artifact is newer than this binary, skipping migration"
            );
            Ok(MigrationOutcome::Downgrade {
                stored: stored.to_string(),
                current: current.to_string(),
            })
        }
        Plan::Upgrade { from, to, steps } => {
            let mut applied = Vec::with_capacity(steps.len());
            for step in steps {
                tracing::info!(version = step.version, "{}", step.description);
                (step.apply)(target)
                    .with_context(|| format!("migration {} failed", step.version))?;
                applied.push(step.version.to_string());
            }
            Ok(MigrationOutcome::Migrated {
                from: from.to_string(),
                to: to.to_string(),
                applied,
            })
        }
    }
}
