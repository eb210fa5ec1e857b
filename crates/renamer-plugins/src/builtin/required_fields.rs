use renamer_core::{
    FieldLookup, Plugin, PluginConfig, PluginError, PluginRow, RowValidator,
};

/// Validator rejecting rows where any listed field is empty.
///
/// Property `fields`: comma separated display names.
#[derive(Debug, Default)]
pub struct RequiredFields {
    fields: Vec<String>,
}

impl RequiredFields {
    /// Registry kind.
    pub const KIND: &'static str = "required_fields";
}

impl Plugin for RequiredFields {
    fn name(&self) -> &str {
        Self::KIND
    }

    fn init(&mut self, config: &PluginConfig) -> Result<(), PluginError> {
        self.fields = config
            .require("fields")?
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        if self.fields.is_empty() {
            return Err(PluginError::configuration(
                Self::KIND,
                "fields",
                "must name at least one field",
            ));
        }
        Ok(())
    }

    fn as_validator(&self) -> Option<&dyn RowValidator> {
        Some(self)
    }
}

impl RowValidator for RequiredFields {
    fn validate(&self, row: &PluginRow<'_>) -> Result<(), PluginError> {
        match self
            .fields
            .iter()
            .find(|name| row.core_value(name).is_none())
        {
            Some(name) => Err(PluginError::data(
                Self::KIND,
                format!("required field '{name}' is empty"),
            )),
            None => Ok(()),
        }
    }
}
