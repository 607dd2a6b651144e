use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;

// Only the crate's own sources are checked. Anything else in the working tree
// (vendored data, scratch files) is left alone.
const SOURCE_DIRS: [&str; 4] = ["effects", "cli", "tests", "benches"];

const FORBIDDEN_WORDS: &str = "FIXED|CORRECTED|FIX|FIXES|NEW|CHANGED|CHANGES|CHANGE|MODIFIED|MODIFIES|MODIFY|UPDATED|UPDATES|UPDATE";

/// One source-hygiene rule: a line pattern plus a filter deciding which
/// matches count as violations.
#[derive(Clone, Copy)]
enum Rule {
    UnderscorePrefix,
    ForbiddenWords,
    StarsInComment,
    AllCapsComment,
    AllowDeadCode,
}

impl Rule {
    const ALL: [Rule; 5] = [
        Rule::UnderscorePrefix,
        Rule::ForbiddenWords,
        Rule::StarsInComment,
        Rule::AllCapsComment,
        Rule::AllowDeadCode,
    ];

    fn pattern(self) -> String {
        match self {
            Rule::UnderscorePrefix => r"\b(_[a-zA-Z0-9_]+)\b".to_string(),
            Rule::ForbiddenWords => format!(r"(//|/\*|///).*(?:{FORBIDDEN_WORDS})"),
            Rule::StarsInComment => r"(//|/\*).*\*\*".to_string(),
            Rule::AllCapsComment => r"(//|/\*|///).*".to_string(),
            Rule::AllowDeadCode => r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]".to_string(),
        }
    }

    fn applies_to_build_script(self) -> bool {
        matches!(self, Rule::UnderscorePrefix)
    }

    /// Decides whether a matched line is a real violation of this rule.
    fn is_violation(self, line_text: &str) -> bool {
        match self {
            Rule::UnderscorePrefix => !is_comment(line_text) && !underscore_only_in_string(line_text),
            Rule::ForbiddenWords => true,
            Rule::StarsInComment => !line_text.trim_start().starts_with("///"),
            Rule::AllCapsComment => comment_body(line_text).is_some_and(|body| {
                let letters: Vec<char> = body.chars().filter(|c| c.is_alphabetic()).collect();
                !letters.is_empty() && letters.iter().all(|c| c.is_uppercase())
            }),
            Rule::AllowDeadCode => true,
        }
    }

    fn explanation(self) -> &'static str {
        match self {
            Rule::UnderscorePrefix => {
                "Underscore-prefixed variable names are not allowed in this project.\n   Either use the variable (removing the underscore) or remove it completely."
            }
            Rule::ForbiddenWords => {
                "Comments containing change-log words such as 'FIX', 'NEW', 'CHANGE' or 'UPDATE' are forbidden.\n   Remove them completely rather than commenting them out."
            }
            Rule::StarsInComment => {
                "The '**' pattern is not allowed in regular comments (but is allowed in doc comments)."
            }
            Rule::AllCapsComment => {
                "Comments where all alphabetic characters are uppercase are forbidden.\n   Strongly consider deleting the comment completely."
            }
            Rule::AllowDeadCode => {
                "#[allow(dead_code)] attributes are forbidden.\n   Either use the code or remove it completely."
            }
        }
    }
}

fn is_comment(line_text: &str) -> bool {
    line_text.trim_start().starts_with("//") || line_text.contains("/*")
}

fn underscore_only_in_string(line_text: &str) -> bool {
    line_text
        .split('"')
        .enumerate()
        .any(|(i, part)| i % 2 == 1 && part.contains('_'))
}

fn comment_body(line_text: &str) -> Option<&str> {
    let trimmed = line_text.trim_start();
    if let Some(rest) = trimmed.strip_prefix("///") {
        return Some(rest.trim());
    }
    if let Some(rest) = trimmed.strip_prefix("//") {
        return Some(rest.trim());
    }
    let start = line_text.find("/*")? + 2;
    let rest = &line_text[start..];
    Some(rest.find("*/").map_or(rest, |end| &rest[..end]).trim())
}

// Collects every violating line of one file so the error lists them all.
struct ViolationCollector {
    rule: Rule,
    file_path: PathBuf,
    violations: Vec<String>,
}

impl ViolationCollector {
    fn new(rule: Rule, file_path: &Path) -> Self {
        Self {
            rule,
            file_path: file_path.to_path_buf(),
            violations: Vec::new(),
        }
    }

    fn check_and_get_error_message(&self) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }

        let mut error_msg = format!(
            "\n❌ ERROR: Found {} hygiene violations in {}:\n",
            self.violations.len(),
            self.file_path.display()
        );
        for violation in &self.violations {
            error_msg.push_str(&format!("   {violation}\n"));
        }
        error_msg.push_str(&format!("\n⚠️ {}\n", self.rule.explanation()));
        Some(error_msg)
    }
}

impl Sink for ViolationCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();

        if self.rule.is_violation(line_text) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

fn rust_sources() -> Vec<PathBuf> {
    let mut files = vec![PathBuf::from("build.rs")];
    for dir in SOURCE_DIRS {
        println!("cargo:rerun-if-changed={dir}");
        files.extend(
            WalkDir::new(dir)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
                .map(|e| e.into_path()),
        );
    }
    files
}

fn scan_sources(files: &[PathBuf]) -> Result<(), Box<dyn Error>> {
    let mut searcher = Searcher::new();

    for rule in Rule::ALL {
        let matcher = RegexMatcher::new_line_matcher(&rule.pattern())?;
        for path in files {
            if path.as_path() == Path::new("build.rs") && !rule.applies_to_build_script() {
                continue;
            }
            let mut collector = ViolationCollector::new(rule, path);
            searcher.search_path(&matcher, path, &mut collector)?;
            if let Some(error_message) = collector.check_and_get_error_message() {
                return Err(error_message.into());
            }
        }
    }

    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    println!("cargo:rustc-env=CINEBIAS_BUILD_TIMESTAMP={timestamp}");

    if let Err(e) = scan_sources(&rust_sources()) {
        // Printed to stderr so cargo shows it with the failed build.
        eprintln!("{e}");
        std::process::exit(1);
    }
}
