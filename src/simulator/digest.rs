//! Rolling context digest
//!
//! Each stage prompt carries a short rollup of the most recent stages
//! rather than the full history, so request size stays flat no matter how
//! far into the workshop a persona is.

use std::collections::VecDeque;

use crate::types::StageResult;

#[derive(Debug, Clone, PartialEq)]
struct DigestEntry {
    stage_number: u32,
    stage_name: String,
    composite: f64,
    top_pain_point: Option<String>,
    would_continue: bool,
}

/// Bounded window over the latest stage results
#[derive(Debug, Clone)]
pub struct ContextDigest {
    max_entries: usize,
    pain_point_chars: usize,
    entries: VecDeque<DigestEntry>,
    seen: usize,
}

impl ContextDigest {
    pub fn new(max_entries: usize, pain_point_chars: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            max_entries,
            pain_point_chars,
            entries: VecDeque::with_capacity(max_entries),
            seen: 0,
        }
    }

    pub fn push(&mut self, result: &StageResult) {
        if self.entries.len() == self.max_entries {
            self.entries.pop_front();
        }
        self.entries.push_back(DigestEntry {
            stage_number: result.stage_number,
            stage_name: result.stage_name.clone(),
            composite: result.composite(),
            top_pain_point: result
                .pain_points
                .first()
                .map(|p| truncate_chars(p, self.pain_point_chars)),
            would_continue: result.would_continue,
        });
        self.seen += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return "None, this is the first stage.".to_string();
        }

        let mut lines = Vec::with_capacity(self.entries.len() + 1);
        let omitted = self.seen - self.entries.len();
        if omitted > 0 {
            lines.push(format!("({} earlier stages omitted)", omitted));
        }
        for entry in &self.entries {
            let issue = entry.top_pain_point.as_deref().unwrap_or("none");
            lines.push(format!(
                "Stage {} ({}): score {:.1}/10, main issue: {}, continuing: {}",
                entry.stage_number,
                entry.stage_name,
                entry.composite,
                issue,
                if entry.would_continue { "yes" } else { "no" }
            ));
        }
        lines.join("\n")
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max).collect();
    cut.push_str("...");
    cut
}
