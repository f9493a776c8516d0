//! Record formats shared by the store implementations.

/// Delimiter separating records inside an agent's memory.
pub const RECORD_DELIMITER: &str = "\n---\n";

/// Stance returned for agents that have never stated one.
pub const UNSTATED_STANCE: &str = "no stated opinion yet";

/// Rationale substituted when generation yields nothing.
pub const FALLBACK_RATIONALE: &str = "No specific reason given.";

/// One conversation's footprint in a participant's memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryEntry {
    /// Simulation tick the conversation happened on.
    pub tick: u64,
    /// The other participant.
    pub partner: u32,
    /// Full three-turn conversation text.
    pub conversation: String,
    /// Opinion score after the conversation, in [-1.0, 1.0].
    pub opinion: f64,
    /// Rationale snapshot at the time of the conversation.
    pub rationale: String,
}

impl MemoryEntry {
    /// Renders the entry into its stored text form.
    pub fn render(&self) -> String {
        format!(
            "[Tick {}] Talked with agent {}:\n{}\nStance: Opinion score {:.2}\nRationale: {}",
            self.tick, self.partner, self.conversation, self.opinion, self.rationale
        )
    }
}

/// Maps an opinion score onto its human-readable stance label.
///
/// Thresholds are strict: a score of exactly 0.6 reads "somewhat in
/// favor", exactly -0.6 reads "strongly against".
pub fn stance_label(opinion: f64, topic: &str) -> String {
    if opinion > 0.6 {
        format!("Strongly in favor of the position on {topic}")
    } else if opinion > 0.2 {
        format!("Somewhat in favor of the position on {topic}")
    } else if opinion > -0.2 {
        format!("Neutral / undecided on {topic}")
    } else if opinion > -0.6 {
        format!("Somewhat against the position on {topic}")
    } else {
        format!("Strongly against the position on {topic}")
    }
}

/// Renders an agent's first memory record.
///
/// The `opinion score:` clause is what offline tools parse to discover
/// initial opinions, so its shape is part of the external interface.
pub fn initial_record(opinion: f64, stance: &str, rationale: &str) -> String {
    format!("Stance: {stance} (opinion score: {opinion:.2})\nRationale: {rationale}")
}

/// Splits raw memory text into trimmed, non-empty records.
pub fn split_records(text: &str) -> Vec<String> {
    text.split(RECORD_DELIMITER)
        .map(str::trim)
        .filter(|record| !record.is_empty())
        .map(str::to_string)
        .collect()
}

/// Finds the most recently written line carrying the given label.
///
/// Scans the text bottom-up; the label must sit at the start of its line
/// (e.g. `"Stance:"`). Returns the trimmed remainder of the line.
pub fn last_labeled_line(text: &str, label: &str) -> Option<String> {
    text.lines()
        .rev()
        .find_map(|line| line.strip_prefix(label).map(|rest| rest.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stance_label_thresholds() {
        let topic = "universal basic income";

        assert!(stance_label(0.75, topic).starts_with("Strongly in favor"));
        assert!(stance_label(0.61, topic).starts_with("Strongly in favor"));
        assert!(stance_label(0.6, topic).starts_with("Somewhat in favor"));
        assert!(stance_label(0.21, topic).starts_with("Somewhat in favor"));
        assert!(stance_label(0.2, topic).starts_with("Neutral / undecided"));
        assert!(stance_label(0.0, topic).starts_with("Neutral / undecided"));
        assert!(stance_label(-0.19, topic).starts_with("Neutral / undecided"));
        assert!(stance_label(-0.2, topic).starts_with("Somewhat against"));
        assert!(stance_label(-0.59, topic).starts_with("Somewhat against"));
        assert!(stance_label(-0.6, topic).starts_with("Strongly against"));
        assert!(stance_label(-1.0, topic).starts_with("Strongly against"));
    }

    #[test]
    fn test_stance_label_embeds_topic() {
        let label = stance_label(0.9, "carbon taxes");
        assert!(label.contains("carbon taxes"));
    }

    #[test]
    fn test_memory_entry_render() {
        let entry = MemoryEntry {
            tick: 12,
            partner: 4,
            conversation: "A: hello\nB: hi\nA: bye".to_string(),
            opinion: -0.4,
            rationale: "It affects my commute.".to_string(),
        };

        assert_eq!(
            entry.render(),
            "[Tick 12] Talked with agent 4:\nA: hello\nB: hi\nA: bye\n\
             Stance: Opinion score -0.40\nRationale: It affects my commute."
        );
    }

    #[test]
    fn test_initial_record_format() {
        let record = initial_record(0.35, "Somewhat in favor of the position on T", "Reason.");
        assert_eq!(
            record,
            "Stance: Somewhat in favor of the position on T (opinion score: 0.35)\nRationale: Reason."
        );
    }

    #[test]
    fn test_split_records_well_formed_file() {
        let text = "first record\n---\nsecond record\n---\n";
        assert_eq!(split_records(text), vec!["first record", "second record"]);
    }

    #[test]
    fn test_split_records_empty_text() {
        assert!(split_records("").is_empty());
        assert!(split_records("\n---\n").is_empty());
    }

    #[test]
    fn test_last_labeled_line_picks_newest() {
        let text = "Stance: old stance\nRationale: old\n---\nStance: new stance\nRationale: new\n---\n";

        assert_eq!(last_labeled_line(text, "Stance:").as_deref(), Some("new stance"));
        assert_eq!(last_labeled_line(text, "Rationale:").as_deref(), Some("new"));
    }

    #[test]
    fn test_last_labeled_line_absent() {
        assert_eq!(last_labeled_line("no labels here", "Stance:"), None);
    }
}
