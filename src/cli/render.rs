use crate::deck::{SlideDeck, Template};
use crate::workflow::{Outline, WorkflowRun, WorkflowState};
use std::fmt::Write;
use std::path::PathBuf;

pub fn outline(outline: &Outline) -> String {
    let mut out = format!("# {}\n", outline.title);
    for section in &outline.sections {
        let _ = writeln!(out, "\n## {}", section.heading);
        for point in &section.points {
            let _ = writeln!(out, "- {}", point);
        }
    }
    out
}

pub fn deck(deck: &SlideDeck) -> String {
    let mut out = format!(
        "📊 {} ({} slides, template '{}')\n",
        deck.title,
        deck.slide_count(),
        deck.template.name
    );
    for (index, slide) in deck.slides.iter().enumerate() {
        let kind = if slide.is_title() { "title" } else { "body" };
        let _ = writeln!(out, "\n[{}] {} ({})", index + 1, slide.content.heading, kind);
        for bullet in &slide.content.bullets {
            let _ = writeln!(out, "  • {}", bullet);
        }
        if let Some(notes) = &slide.content.notes {
            let _ = writeln!(out, "  📝 {}", notes);
        }
        if let Some(image) = &slide.content.image_prompt {
            let _ = writeln!(out, "  🖼  {}", image);
        }
    }
    if let Some(thumbnail) = &deck.thumbnail_image_ref {
        let _ = writeln!(out, "\nThumbnail: {}", thumbnail);
    }
    out
}

fn state_icon(state: WorkflowState) -> &'static str {
    match state {
        WorkflowState::Exported | WorkflowState::ExportReady => "✅",
        WorkflowState::Failed(_) => "❌",
        WorkflowState::Abandoned => "🚫",
        _ => "⏳",
    }
}

/// One line per run for `list`.
pub fn run_line(run: &WorkflowRun) -> String {
    format!(
        "{} {}  {:<16} {}  (updated {})",
        state_icon(run.state),
        run.id,
        run.state.to_string(),
        run.idea.topic,
        run.updated_at.format("%Y-%m-%d %H:%M")
    )
}

pub fn run_summary(run: &WorkflowRun) -> String {
    let providers: Vec<&str> = run.providers.iter().map(|p| p.as_str()).collect();
    let mut out = format!(
        "Run {}\n  Topic: {}\n  State: {} {}\n  Providers: {}\n  Template: {}\n",
        run.id,
        run.idea.topic,
        state_icon(run.state),
        run.state,
        providers.join(", "),
        run.template
    );
    if !run.candidates.is_empty() {
        let _ = writeln!(
            out,
            "  Candidates: {} ({} merged points)",
            run.candidates.len(),
            run.merged_points.len()
        );
    }
    if !run.previous_decks.is_empty() {
        let _ = writeln!(out, "  Previous decks: {}", run.previous_decks.len());
    }
    if let Some(receipt) = &run.export {
        let _ = writeln!(out, "  Exported: {} -> {}", receipt.format, receipt.handle);
    }
    if !run.errors.is_empty() {
        out.push_str("  Errors:\n");
        for error in &run.errors {
            let _ = writeln!(out, "    {}", error);
        }
    }
    out
}

pub fn templates<'a>(templates: impl Iterator<Item = &'a Template>, default: &str) -> String {
    let mut out = String::from("📐 Templates:\n");
    for template in templates {
        let marker = if template.name == default { "*" } else { " " };
        let _ = writeln!(
            out,
            " {} {:<16} max {} bullets/slide  {}",
            marker, template.name, template.max_bullets_per_slide, template.description
        );
    }
    out
}

pub fn discovery(report: &[(PathBuf, bool)]) -> String {
    let mut out = String::from("🔍 Configuration Discovery:\n");
    for (index, (path, exists)) in report.iter().enumerate() {
        let status = if *exists { "✓ EXISTS" } else { "✗ NOT FOUND" };
        let _ = writeln!(out, "  {}. {} - {}", index + 1, path.display(), status);
    }
    match report.iter().find(|(_, exists)| *exists) {
        Some((path, _)) => {
            let _ = writeln!(out, "\n📁 Active configuration: {}", path.display());
        }
        None => out.push_str("\n📁 No configuration file found, using built-in defaults\n"),
    }
    out.push_str(
        "\n🔑 API keys are read from ANTHROPIC_API_KEY and OPENAI_API_KEY unless\n   a provider names a different api_key_env.\n",
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::TemplateRegistry;
    use crate::llm::Provider;
    use crate::workflow::{ErrorKind, Idea, OutlineSection, Stage, StageError};

    #[test]
    fn test_outline_renders_as_markdown() {
        let rendered = outline(&Outline {
            title: "Intro to Rust".into(),
            sections: vec![OutlineSection::new("Why", vec!["Fast".into()])],
        });
        assert_eq!(rendered, "# Intro to Rust\n\n## Why\n- Fast\n");
        let reparsed = crate::parser::parse_outline_text(&rendered, None).unwrap();
        assert_eq!(reparsed.sections[0].points, vec!["Fast"]);
    }

    #[test]
    fn test_run_summary_lists_errors() {
        let mut run = WorkflowRun::new(Idea::new("Intro to Rust"), vec![Provider::Claude37, Provider::Gpt4]);
        run.errors.push(
            StageError::new(Stage::Brainstorming, ErrorKind::Provider, "timed out")
                .for_provider(Provider::Gpt4),
        );
        let summary = run_summary(&run);
        assert!(summary.contains("Providers: claude-37, gpt4"));
        assert!(summary.contains("[brainstorming] gpt4 Provider: timed out"));
    }

    #[test]
    fn test_templates_marks_default() {
        let registry = TemplateRegistry::builtin();
        let rendered = templates(registry.iter(), "dark");
        assert!(rendered.lines().any(|line| line.starts_with(" * dark")));
    }

    #[test]
    fn test_discovery_picks_first_existing() {
        let report = vec![
            (PathBuf::from("slidesmith.toml"), false),
            (PathBuf::from("/home/u/.slidesmith/config.toml"), true),
        ];
        let rendered = discovery(&report);
        assert!(rendered.contains("✗ NOT FOUND"));
        assert!(rendered.contains("Active configuration: /home/u/.slidesmith/config.toml"));
    }
}
