//! Preflight check types and report.

/// Result of a single preflight check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    /// The requested run cannot succeed.
    Fail,
    Warn,
    /// Not needed for the requested run.
    Skip,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, details: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            details,
        }
    }

    pub fn pass_with(name: &str, details: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Pass, Some(details.into()))
    }

    pub fn fail(name: &str, details: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Fail, Some(details.into()))
    }

    pub fn warn(name: &str, details: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Warn, Some(details.into()))
    }

    pub fn skip(name: &str, details: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Skip, Some(details.into()))
    }
}

/// Results of all preflight checks.
pub struct PreflightReport {
    pub checks: Vec<CheckResult>,
}

impl PreflightReport {
    fn count(&self, status: CheckStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }

    /// No check failed.
    pub fn all_passed(&self) -> bool {
        self.fail_count() == 0
    }

    pub fn fail_count(&self) -> usize {
        self.count(CheckStatus::Fail)
    }

    /// Print the report to stdout.
    pub fn print(&self) {
        println!("=== Preflight Check Results ===\n");

        for check in &self.checks {
            let (icon, label) = match check.status {
                CheckStatus::Pass => ("✓", "PASS"),
                CheckStatus::Fail => ("✗", "FAIL"),
                CheckStatus::Warn => ("⚠", "WARN"),
                CheckStatus::Skip => ("○", "SKIP"),
            };
            match &check.details {
                Some(details) => println!("  {} [{}] {}: {}", icon, label, check.name, details),
                None => println!("  {} [{}] {}", icon, label, check.name),
            }
        }

        println!();
        let applicable = self.checks.len() - self.count(CheckStatus::Skip);
        println!("Summary: {}/{} passed", self.count(CheckStatus::Pass), applicable);
        let failed = self.fail_count();
        if failed > 0 {
            println!("         {} FAILED - assembly will not succeed", failed);
        }
        let warned = self.count(CheckStatus::Warn);
        if warned > 0 {
            println!("         {} warnings", warned);
        }
    }
}
