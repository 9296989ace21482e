use std::{collections::BTreeMap, ffi::OsStr, path::Path};

use crate::render::{Template, TemplateError};

const BUILTIN: &[(&str, &str)] = &[
    ("register", include_str!("../../templates/register.toml")),
    ("srd", include_str!("../../templates/srd.toml")),
    ("sss", include_str!("../../templates/sss.toml")),
    ("srs", include_str!("../../templates/srs.toml")),
    ("std", include_str!("../../templates/std.toml")),
];

/// The templates available to a project, by name.
#[derive(Debug, Clone)]
pub struct Templates {
    by_name: BTreeMap<String, Template>,
}

impl Templates {
    /// The built-in templates.
    ///
    /// # Panics
    ///
    /// Panics if a bundled template is invalid, which is caught by the tests.
    #[must_use]
    pub fn builtin() -> Self {
        let by_name = BUILTIN
            .iter()
            .map(|(name, text)| {
                let template = Template::from_toml(name, text)
                    .unwrap_or_else(|e| panic!("bundled template is invalid: {e}"));
                ((*name).to_string(), template)
            })
            .collect();
        Self { by_name }
    }

    /// The built-in templates, overlaid with every `*.toml` file in `dir`.
    ///
    /// A custom template with the same name as a built-in one replaces it. A
    /// missing directory yields just the built-ins.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Load`] if a template file cannot be read or
    /// parsed.
    #[tracing::instrument]
    pub fn load(dir: &Path) -> Result<Self, TemplateError> {
        let mut templates = Self::builtin();
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Ok(templates);
        };

        let mut paths: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension() == Some(OsStr::new("toml")))
            .collect();
        paths.sort();

        for path in paths {
            let template = Template::load(&path)?;
            tracing::debug!(name = %template.name, "loaded custom template");
            templates.insert(template);
        }
        Ok(templates)
    }

    /// Add a template, replacing any with the same name.
    pub fn insert(&mut self, template: Template) {
        self.by_name.insert(template.name.clone(), template);
    }

    /// Look up a template by name.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::UnknownTemplate`] if there is no such template.
    pub fn get(&self, name: &str) -> Result<&Template, TemplateError> {
        self.by_name
            .get(name)
            .ok_or_else(|| TemplateError::UnknownTemplate {
                name: name.to_string(),
                available: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    /// Names of every template, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }
}

impl Default for Templates {
    fn default() -> Self {
        Self::builtin()
    }
}
