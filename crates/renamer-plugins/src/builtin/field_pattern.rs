use regex::Regex;
use renamer_core::{
    FieldLookup, Plugin, PluginConfig, PluginError, PluginRow, RowValidator,
};

/// Validator requiring a field's core value to match a regular expression.
///
/// Properties `field` and `pattern`. The pattern must match the whole value.
/// Empty values pass; pair with `required_fields` to demand presence.
#[derive(Debug, Default)]
pub struct FieldPattern {
    field: String,
    pattern: Option<Regex>,
}

impl FieldPattern {
    /// Registry kind.
    pub const KIND: &'static str = "field_pattern";
}

impl Plugin for FieldPattern {
    fn name(&self) -> &str {
        Self::KIND
    }

    fn init(&mut self, config: &PluginConfig) -> Result<(), PluginError> {
        self.field = config.require("field")?.to_string();
        let pattern = config.require("pattern")?;
        let anchored = Regex::new(&format!("^(?:{pattern})$")).map_err(|err| {
            PluginError::configuration(
                Self::KIND,
                "pattern",
                format!("is not a valid regular expression: {err}"),
            )
        })?;
        self.pattern = Some(anchored);
        Ok(())
    }

    fn as_validator(&self) -> Option<&dyn RowValidator> {
        Some(self)
    }
}

impl RowValidator for FieldPattern {
    fn validate(&self, row: &PluginRow<'_>) -> Result<(), PluginError> {
        let (Some(pattern), Some(value)) = (&self.pattern, row.core_value(&self.field)) else {
            return Ok(());
        };
        if pattern.is_match(value) {
            return Ok(());
        }
        Err(PluginError::data(
            Self::KIND,
            format!("{} value '{value}' does not match the configured pattern", self.field),
        ))
    }
}
