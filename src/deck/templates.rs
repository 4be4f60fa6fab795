use crate::deck::types::{
    BodySlideStyle, FormatOptions, Template, Theme, TitleSlideStyle, ValidationError,
};
use std::collections::BTreeMap;

pub const DEFAULT_TEMPLATE: &str = "default";

const SLIDE_DECK_PRO_GUIDE: &str = "\
Write each slide as: a title of 2 to 6 words, a body of 2 to 3 complete \
sentences, then key points formatted as '<Key Point>: <one complete sentence>'. \
Keep the user's terminology, match the tone of the topic and do not add \
conversation around the slide.";

/// Built-in and user-supplied templates, keyed by name.
///
/// Templates are read-only once registered and shared by every run.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, Template>,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateRegistry {
    pub fn builtin() -> Self {
        let templates = [default_template(), dark_template(), slide_deck_pro_template()]
            .into_iter()
            .map(|template| (template.name.clone(), template))
            .collect();
        Self { templates }
    }

    /// Built-ins plus `extra`; an extra template replaces a built-in of the same name.
    pub fn with_templates(extra: &[Template]) -> Result<Self, ValidationError> {
        let mut registry = Self::builtin();
        for template in extra {
            registry.register(template.clone())?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, template: Template) -> Result<(), ValidationError> {
        if template.max_bullets_per_slide == 0 {
            return Err(ValidationError::InvalidBulletLimit(template.name));
        }
        self.templates.insert(template.name.clone(), template);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }
}

fn default_template() -> Template {
    Template::default()
}

fn dark_template() -> Template {
    Template {
        name: "dark".to_string(),
        description: "Dark background with light text".to_string(),
        theme: Theme {
            title_color: "#FFFFFF".to_string(),
            body_color: "#DDDDDD".to_string(),
            accent_color: "#66CCFF".to_string(),
            background_color: "#222222".to_string(),
            ..Theme::default()
        },
        ..Template::default()
    }
}

fn slide_deck_pro_template() -> Template {
    Template {
        name: "slide_deck_pro".to_string(),
        description: "Professional format with title, body and key points".to_string(),
        max_bullets_per_slide: 5,
        title_slide_style: TitleSlideStyle::Banner,
        body_slide_style: BodySlideStyle::Bullets,
        format: FormatOptions {
            bold_key_terms: true,
            ensure_terminal_punctuation: true,
            highlight_color: Some("#3366FF".to_string()),
        },
        style_guide: Some(SLIDE_DECK_PRO_GUIDE.to_string()),
        ..Template::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_templates() {
        let registry = TemplateRegistry::builtin();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, vec!["dark", "default", "slide_deck_pro"]);
        assert_eq!(registry.get("dark").unwrap().theme.background_color, "#222222");
        assert!(registry.get("slide_deck_pro").unwrap().style_guide.is_some());
    }

    #[test]
    fn test_user_template_overrides_builtin() {
        let custom = Template {
            name: "default".to_string(),
            max_bullets_per_slide: 3,
            ..Template::default()
        };
        let registry = TemplateRegistry::with_templates(&[custom]).unwrap();
        assert_eq!(registry.get(DEFAULT_TEMPLATE).unwrap().max_bullets_per_slide, 3);
    }

    #[test]
    fn test_zero_bullet_limit_rejected() {
        let broken = Template {
            name: "broken".to_string(),
            max_bullets_per_slide: 0,
            ..Template::default()
        };
        assert_eq!(
            TemplateRegistry::with_templates(&[broken]).unwrap_err(),
            ValidationError::InvalidBulletLimit("broken".to_string())
        );
    }
}
