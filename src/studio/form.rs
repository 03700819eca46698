//! Form state: prompt rows, generation options, templates and reference image

use crate::api::models::GenerationMode;
use crate::config::GenerationDefaults;
use crate::error::{AppError, Result};
use crate::storage::{Preset, PresetFields};
use crate::studio::reference::ReferenceImage;

/// Fast model, the default
pub const MODEL_FAST: &str = "gemini-2.5-flash-image";

/// Pro model, required for any aspect ratio other than 1:1
pub const MODEL_PRO: &str = "gemini-3-pro-image-preview";

pub const SQUARE: &str = "1:1";

/// Aspect ratios the server understands
pub const ASPECT_RATIOS: &[&str] = &[
    "1:1", "16:9", "9:16", "4:3", "3:4", "3:2", "2:3", "5:4", "4:5", "21:9",
];

/// Pro-tier models carry `pro` in their id
pub fn is_pro_model(model: &str) -> bool {
    model.contains("pro")
}

/// Everything the user has entered for the next submission
#[derive(Debug, Clone)]
pub struct FormState {
    prompt_rows: Vec<String>,
    model: String,
    pub mode: GenerationMode,
    aspect_ratio: String,
    pub templates: PresetFields,
    pub selected_preset: Option<String>,
    pub reference_mode: bool,
    reference: Option<ReferenceImage>,
}

impl FormState {
    pub fn new(defaults: &GenerationDefaults) -> Self {
        let mut form = Self {
            prompt_rows: vec![String::new()],
            model: defaults.model.clone(),
            mode: defaults.mode.parse().unwrap_or_default(),
            aspect_ratio: SQUARE.to_string(),
            templates: PresetFields::default(),
            selected_preset: None,
            reference_mode: false,
            reference: None,
        };
        if form.set_aspect_ratio(&defaults.aspect_ratio).is_err() {
            form.aspect_ratio = SQUARE.to_string();
        }
        form
    }

    // ---- prompt rows ----

    pub fn prompt_rows(&self) -> &[String] {
        &self.prompt_rows
    }

    /// Append a row and return its index
    pub fn add_prompt_row(&mut self, value: impl Into<String>) -> usize {
        self.prompt_rows.push(value.into());
        self.prompt_rows.len() - 1
    }

    pub fn set_prompt_row(&mut self, index: usize, value: impl Into<String>) -> Result<()> {
        let row = self.prompt_rows.get_mut(index).ok_or_else(|| {
            AppError::InvalidRequest(format!("No prompt row at position {}", index + 1))
        })?;
        *row = value.into();
        Ok(())
    }

    /// Remove a row; the last remaining row cannot be removed
    pub fn remove_prompt_row(&mut self, index: usize) -> Result<()> {
        if self.prompt_rows.len() <= 1 {
            return Err(AppError::precondition("At least 1 prompt is required"));
        }
        if index >= self.prompt_rows.len() {
            return Err(AppError::InvalidRequest(format!(
                "No prompt row at position {}",
                index + 1
            )));
        }
        self.prompt_rows.remove(index);
        Ok(())
    }

    /// Replace every row; an empty input leaves one empty row
    pub fn set_prompts<I, S>(&mut self, prompts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prompt_rows = prompts.into_iter().map(Into::into).collect();
        if self.prompt_rows.is_empty() {
            self.prompt_rows.push(String::new());
        }
    }

    /// Non-blank rows, trimmed, in row order
    pub fn prompts(&self) -> Vec<String> {
        self.prompt_rows
            .iter()
            .map(|row| row.trim())
            .filter(|row| !row.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn prompt_count(&self) -> usize {
        self.prompt_rows
            .iter()
            .filter(|row| !row.trim().is_empty())
            .count()
    }

    // ---- model and aspect ratio ----

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn aspect_ratio(&self) -> &str {
        &self.aspect_ratio
    }

    /// Switch model. Moving to a fast model resets a non-square ratio to 1:1
    /// and returns the warning to show.
    pub fn select_model(&mut self, model: impl Into<String>) -> Option<String> {
        self.model = model.into();
        if !is_pro_model(&self.model) && self.aspect_ratio != SQUARE {
            self.aspect_ratio = SQUARE.to_string();
            return Some(
                "Aspect ratio other than 1:1 only works with Pro model. Switching to 1:1."
                    .to_string(),
            );
        }
        None
    }

    pub fn set_aspect_ratio(&mut self, ratio: &str) -> Result<()> {
        let ratio = ratio.trim();
        if !ASPECT_RATIOS.contains(&ratio) {
            return Err(AppError::InvalidRequest(format!(
                "Unsupported aspect ratio '{}'",
                ratio
            )));
        }
        if ratio != SQUARE && !is_pro_model(&self.model) {
            return Err(AppError::precondition(format!(
                "Aspect ratio {} requires the Pro model",
                ratio
            )));
        }
        self.aspect_ratio = ratio.to_string();
        Ok(())
    }

    /// Ratios selectable with the current model
    pub fn available_aspect_ratios(&self) -> Vec<&'static str> {
        if is_pro_model(&self.model) {
            ASPECT_RATIOS.to_vec()
        } else {
            vec![SQUARE]
        }
    }

    // ---- templates ----

    /// Copy a preset's templates into the form
    pub fn apply_preset(&mut self, preset: &Preset) {
        self.templates = preset.fields.clone();
        self.selected_preset = Some(preset.name.clone());
    }

    pub fn clear_templates(&mut self) {
        self.templates = PresetFields::default();
        self.selected_preset = None;
    }

    // ---- reference image ----

    pub fn reference(&self) -> Option<&ReferenceImage> {
        self.reference.as_ref()
    }

    pub fn reference_mut(&mut self) -> Option<&mut ReferenceImage> {
        self.reference.as_mut()
    }

    pub fn set_reference(&mut self, image: ReferenceImage) {
        self.reference = Some(image);
    }

    pub fn remove_reference(&mut self) {
        self.reference = None;
    }

    /// Reset prompts, templates, preset selection and reference image.
    /// Model, mode and aspect ratio are kept.
    pub fn clear(&mut self) {
        self.prompt_rows = vec![String::new()];
        self.clear_templates();
        self.reference = None;
    }
}

impl Default for FormState {
    fn default() -> Self {
        Self {
            prompt_rows: vec![String::new()],
            model: MODEL_FAST.to_string(),
            mode: GenerationMode::Sequential,
            aspect_ratio: SQUARE.to_string(),
            templates: PresetFields::default(),
            selected_preset: None,
            reference_mode: false,
            reference: None,
        }
    }
}
