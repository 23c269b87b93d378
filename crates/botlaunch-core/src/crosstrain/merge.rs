//! Interruption-intent merge for language and knowledge-base sources.
//!
//! Invoked once for the whole bundle. A single malformed file aborts the
//! entire cross-train step; nothing is silently skipped.

use std::collections::BTreeMap;

use botlaunch_types::crosstrain::CrossTrainConfig;
use botlaunch_types::error::PublishError;
use botlaunch_types::project::ProjectFile;

/// One intent section of a `.lu` document, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuSection {
    pub intent: String,
    pub utterances: Vec<String>,
}

/// The augmented model sources produced by cross-training.
#[derive(Debug, Clone, Default)]
pub struct CrossTrained {
    pub lu: Vec<ProjectFile>,
    pub qna: Vec<ProjectFile>,
}

/// Parse a `.lu` document into its intent sections.
///
/// Recognized lines: `# Intent` headers, `- utterance` entries, `>`
/// comments, and blanks. Anything else is malformed.
pub fn parse_lu(file: &ProjectFile) -> Result<Vec<LuSection>, PublishError> {
    let mut sections: Vec<LuSection> = Vec::new();

    for (idx, raw) in file.content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('>') {
            continue;
        }
        if let Some(header) = line.strip_prefix('#') {
            sections.push(LuSection {
                intent: header.trim_start_matches('#').trim().to_string(),
                utterances: Vec::new(),
            });
        } else if let Some(utterance) = line.strip_prefix('-') {
            match sections.last_mut() {
                Some(section) => section.utterances.push(utterance.trim().to_string()),
                None => {
                    return Err(malformed(file, idx, "utterance before any intent header"));
                }
            }
        } else {
            return Err(malformed(file, idx, "unrecognized line"));
        }
    }

    Ok(sections)
}

/// Validate a `.qna` document. Only structure is checked here; the merge
/// appends to the raw content.
///
/// Recognized lines outside answer fences: `# ? question` headers, `-`
/// alternate questions, `>` comments, blanks, and ``` fences.
pub fn validate_qna(file: &ProjectFile) -> Result<(), PublishError> {
    let mut in_answer = false;
    let mut saw_question = false;

    for (idx, raw) in file.content.lines().enumerate() {
        let line = raw.trim();
        if line.starts_with("```") {
            in_answer = !in_answer;
            continue;
        }
        if in_answer || line.is_empty() || line.starts_with('>') {
            continue;
        }
        if line.starts_with("# ?") || line.starts_with("#?") {
            saw_question = true;
        } else if line.starts_with('-') {
            if !saw_question {
                return Err(malformed(file, idx, "alternate question before any '# ?' header"));
            }
        } else {
            return Err(malformed(file, idx, "unrecognized line"));
        }
    }

    if in_answer {
        return Err(PublishError::CrossTrain {
            file: file.relative_path.clone(),
            reason: "unterminated answer fence".to_string(),
        });
    }

    Ok(())
}

fn malformed(file: &ProjectFile, line_idx: usize, reason: &str) -> PublishError {
    PublishError::CrossTrain {
        file: file.relative_path.clone(),
        reason: format!("line {}: {reason}", line_idx + 1),
    }
}

/// Merge interruption intents into every model source per the config.
///
/// Each dialog's model gains the utterances of the triggers it defers to:
/// `.lu` sources as an extra intent section, `.qna` sources as an extra
/// question set answered by the interruption marker.
pub fn cross_train(
    lu_files: &[ProjectFile],
    qna_files: &[ProjectFile],
    config: &CrossTrainConfig,
) -> Result<CrossTrained, PublishError> {
    // Parse everything up front so one malformed file aborts the step
    // before any output is produced.
    let mut parsed: BTreeMap<String, Vec<LuSection>> = BTreeMap::new();
    for file in lu_files {
        parsed.insert(file.stem().to_string(), parse_lu(file)?);
    }
    for file in qna_files {
        validate_qna(file)?;
    }

    let mut result = CrossTrained::default();

    for file in lu_files {
        let deferred = deferred_utterances(file.stem(), config, &parsed);
        let mut content = file.content.clone();
        if !deferred.is_empty() {
            if !content.ends_with('\n') {
                content.push('\n');
            }
            content.push_str(&format!("\n# {}\n", config.intent_name));
            for utterance in &deferred {
                content.push_str(&format!("- {utterance}\n"));
            }
        }
        result.lu.push(ProjectFile::new(file.relative_path.clone(), content));
    }

    for file in qna_files {
        let deferred = deferred_utterances(file.stem(), config, &parsed);
        let mut content = file.content.clone();
        if !deferred.is_empty() {
            if !content.ends_with('\n') {
                content.push('\n');
            }
            content.push_str(&format!("\n# ? {}\n", deferred[0]));
            for utterance in &deferred[1..] {
                content.push_str(&format!("- {utterance}\n"));
            }
            content.push_str(&format!(
                "\n```markdown\nintent={}\n```\n",
                config.intent_name
            ));
        }
        result
            .qna
            .push(ProjectFile::new(file.relative_path.clone(), content));
    }

    Ok(result)
}

/// Utterances of every trigger `dialog` defers to, deduplicated in
/// config order.
fn deferred_utterances(
    dialog: &str,
    config: &CrossTrainConfig,
    parsed: &BTreeMap<String, Vec<LuSection>>,
) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    let mut out = Vec::new();

    for trigger_id in config.deferred(dialog) {
        let Some((parent, intent)) = trigger_id.split_once('.') else {
            continue;
        };
        let Some(sections) = parsed.get(parent) else {
            continue;
        };
        for section in sections.iter().filter(|s| s.intent == intent) {
            for utterance in &section.utterances {
                if seen.insert(utterance.clone()) {
                    out.push(utterance.clone());
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_rule(child: &str, deferred: &[&str]) -> CrossTrainConfig {
        let mut config = CrossTrainConfig::new();
        config
            .trigger_rules
            .entry(child.to_string())
            .or_default()
            .extend(deferred.iter().map(|s| s.to_string()));
        config
    }

    #[test]
    fn parse_lu_sections_and_utterances() {
        let file = ProjectFile::new(
            "main.lu",
            "> comment\n# Greet\n- hi\n- hello there\n\n# Cancel\n- stop\n",
        );
        let sections = parse_lu(&file).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].intent, "Greet");
        assert_eq!(sections[0].utterances, vec!["hi", "hello there"]);
        assert_eq!(sections[1].intent, "Cancel");
    }

    #[test]
    fn parse_lu_rejects_orphan_utterance() {
        let file = ProjectFile::new("bad.lu", "- floating utterance\n");
        let err = parse_lu(&file).unwrap_err();
        assert!(err.to_string().contains("bad.lu"));
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn parse_lu_rejects_garbage_line() {
        let file = ProjectFile::new("bad.lu", "# Greet\nnot an utterance\n");
        assert!(parse_lu(&file).is_err());
    }

    #[test]
    fn lu_gains_interruption_intent_from_deferred_triggers() {
        let main = ProjectFile::new("main.lu", "# Greet\n- hi\n# Cancel\n- stop\n");
        let weather = ProjectFile::new("dialogs/weather/weather.lu", "# Forecast\n- rain?\n");
        let config = config_with_rule("weather", &["main.Cancel", "main.Greet"]);

        let trained = cross_train(&[main, weather], &[], &config).unwrap();
        let augmented = &trained.lu[1];
        assert!(augmented.content.contains("# _Interruption"));
        assert!(augmented.content.contains("- stop"));
        assert!(augmented.content.contains("- hi"));
        // The original section survives untouched.
        assert!(augmented.content.starts_with("# Forecast"));
        // Files with no defer rules pass through unchanged.
        assert!(!trained.lu[0].content.contains("_Interruption"));
    }

    #[test]
    fn qna_gains_interruption_question_set() {
        let main = ProjectFile::new("main.lu", "# Cancel\n- stop\n- never mind\n");
        let faq = ProjectFile::new("faq.qna", "# ? hours\n```\n9-5\n```\n");
        let config = config_with_rule("faq", &["main.Cancel"]);

        let trained = cross_train(&[main], &[faq], &config).unwrap();
        let augmented = &trained.qna[0];
        assert!(augmented.content.contains("# ? stop"));
        assert!(augmented.content.contains("- never mind"));
        assert!(augmented.content.contains("intent=_Interruption"));
    }

    #[test]
    fn one_malformed_file_aborts_everything() {
        let good = ProjectFile::new("main.lu", "# Greet\n- hi\n");
        let bad = ProjectFile::new("broken.lu", "?? what\n");
        let config = CrossTrainConfig::new();
        let err = cross_train(&[good, bad], &[], &config).unwrap_err();
        assert!(matches!(err, PublishError::CrossTrain { ref file, .. } if file == "broken.lu"));
    }

    #[test]
    fn unterminated_qna_fence_is_malformed() {
        let faq = ProjectFile::new("faq.qna", "# ? hours\n```\n9-5\n");
        assert!(validate_qna(&faq).is_err());
    }

    #[test]
    fn deferred_utterances_deduplicate() {
        let main = ProjectFile::new("main.lu", "# A\n- same\n# B\n- same\n- other\n");
        let parsed = BTreeMap::from([("main".to_string(), parse_lu(&main).unwrap())]);
        let config = config_with_rule("child", &["main.A", "main.B"]);
        let utterances = deferred_utterances("child", &config, &parsed);
        assert_eq!(utterances, vec!["same", "other"]);
    }
}
