//! Verify command implementation.

use std::path::Path;

/// Verification result.
#[derive(Debug)]
pub struct VerifyResult {
    /// Number of lines checked (blank lines excluded).
    pub lines_checked: usize,
    /// Number of blank lines skipped.
    pub blank_lines: usize,
    /// Number of lines that decoded.
    pub valid_lines: usize,
    /// Number of lines that did not decode.
    pub corrupt_lines: usize,
    /// One entry per corrupt line.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn new() -> Self {
        Self {
            lines_checked: 0,
            blank_lines: 0,
            valid_lines: 0,
            corrupt_lines: 0,
            errors: Vec::new(),
        }
    }

    fn is_ok(&self) -> bool {
        self.corrupt_lines == 0
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying log at {:?}", path);
    println!();

    let text = super::read_log_text(path)?;
    let result = verify_lines(&text);

    println!(
        "  lines checked: {} ({} blank skipped)",
        result.lines_checked, result.blank_lines
    );
    println!("  valid:   {}", result.valid_lines);
    println!("  corrupt: {}", result.corrupt_lines);
    for error in &result.errors {
        println!("    ERROR: {error}");
    }

    println!();
    if result.is_ok() {
        println!("✓ Log verification passed");
        Ok(())
    } else {
        println!("✗ Log verification failed");
        Err("Verification failed".into())
    }
}

fn verify_lines(text: &str) -> VerifyResult {
    let mut result = VerifyResult::new();
    for (number, line) in text.lines().enumerate() {
        if line.is_empty() {
            result.blank_lines += 1;
            continue;
        }
        result.lines_checked += 1;
        match jotdb_codec::deserialize(line) {
            Ok(_) => result.valid_lines += 1,
            Err(err) => {
                result.corrupt_lines += 1;
                result
                    .errors
                    .push(format!("line {}: {}", number + 1, err));
            }
        }
    }
    result
}
