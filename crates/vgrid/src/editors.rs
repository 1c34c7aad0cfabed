//! Ready-made cell editors.
//!
//! These cover the common column shapes: free text with an optional
//! validator, and a checkbox toggled with the space bar. Anything richer
//! implements [`CellEditor`] directly.

use std::rc::Rc;

use vgrid_core::data::{CellValue, GridItem};
use vgrid_core::editing::{CellEditor, EditorArgs, EditorFactory, EditorKeyOutcome, Validation};
use vgrid_core::input::{KeyCode, KeyEvent};

/// Validation hook for [`TextInputEditor`].
pub type Validator = Rc<dyn Fn(&str) -> Validation>;

/// Single-line text editor with a movable caret.
pub struct TextInputEditor {
    field: String,
    value: String,
    initial: String,
    /// Caret as a char offset into `value`.
    cursor: usize,
    validator: Option<Validator>,
}

impl TextInputEditor {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: String::new(),
            initial: String::new(),
            cursor: 0,
            validator: None,
        }
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Factory wired to the column's backing field.
    pub fn factory() -> Rc<dyn EditorFactory> {
        Rc::new(|args: &EditorArgs<'_>| {
            Box::new(TextInputEditor::new(args.column.field.clone())) as Box<dyn CellEditor>
        })
    }

    /// Like [`TextInputEditor::factory`], with a validator attached to every
    /// produced editor.
    pub fn validated_factory(validator: Validator) -> Rc<dyn EditorFactory> {
        Rc::new(move |args: &EditorArgs<'_>| {
            Box::new(
                TextInputEditor::new(args.column.field.clone())
                    .with_validator(validator.clone()),
            ) as Box<dyn CellEditor>
        })
    }

    fn byte_at(&self, char_idx: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_idx)
            .map(|(b, _)| b)
            .unwrap_or(self.value.len())
    }
}

impl CellEditor for TextInputEditor {
    fn load_value(&mut self, item: &dyn GridItem) {
        self.initial = item.value(&self.field).to_string();
        self.value = self.initial.clone();
        self.cursor = self.value.chars().count();
    }

    fn serialize_value(&self) -> CellValue {
        CellValue::Text(self.value.clone())
    }

    fn apply_value(&self, item: &mut dyn GridItem, value: &CellValue) {
        item.set_value(&self.field, value.clone());
    }

    fn is_value_changed(&self) -> bool {
        self.value != self.initial
    }

    fn validate(&self) -> Validation {
        match &self.validator {
            Some(validator) => validator(&self.value),
            None => Validation::Valid,
        }
    }

    fn text(&self) -> String {
        self.value.clone()
    }

    fn cursor(&self) -> Option<usize> {
        Some(self.cursor)
    }

    fn handle_key(&mut self, key: &KeyEvent) -> EditorKeyOutcome {
        if key.modifiers.ctrl || key.modifiers.alt {
            return EditorKeyOutcome::Ignored;
        }
        match key.code {
            KeyCode::Char(c) => {
                let at = self.byte_at(self.cursor);
                self.value.insert(at, c);
                self.cursor += 1;
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    let at = self.byte_at(self.cursor);
                    self.value.remove(at);
                }
            }
            KeyCode::Delete => {
                if self.cursor < self.value.chars().count() {
                    let at = self.byte_at(self.cursor);
                    self.value.remove(at);
                }
            }
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.value.chars().count()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.value.chars().count(),
            _ => return EditorKeyOutcome::Ignored,
        }
        EditorKeyOutcome::Consumed
    }
}

/// Two-state editor toggled with the space bar.
///
/// Loads truthily from bool, non-zero int, float, or the text `"true"`, and
/// always serializes a [`CellValue::Bool`].
pub struct CheckboxEditor {
    field: String,
    value: bool,
    initial: bool,
}

impl CheckboxEditor {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: false,
            initial: false,
        }
    }

    pub fn factory() -> Rc<dyn EditorFactory> {
        Rc::new(|args: &EditorArgs<'_>| {
            Box::new(CheckboxEditor::new(args.column.field.clone())) as Box<dyn CellEditor>
        })
    }

    fn coerce(value: &CellValue) -> bool {
        match value {
            CellValue::Bool(b) => *b,
            CellValue::Int(n) => *n != 0,
            CellValue::Float(f) => *f != 0.0,
            CellValue::Text(s) => s == "true",
            CellValue::Null => false,
        }
    }
}

impl CellEditor for CheckboxEditor {
    fn load_value(&mut self, item: &dyn GridItem) {
        self.initial = Self::coerce(&item.value(&self.field));
        self.value = self.initial;
    }

    fn serialize_value(&self) -> CellValue {
        CellValue::Bool(self.value)
    }

    fn apply_value(&self, item: &mut dyn GridItem, value: &CellValue) {
        item.set_value(&self.field, value.clone());
    }

    fn is_value_changed(&self) -> bool {
        self.value != self.initial
    }

    fn validate(&self) -> Validation {
        Validation::Valid
    }

    fn text(&self) -> String {
        if self.value { "[x]" } else { "[ ]" }.to_string()
    }

    fn handle_key(&mut self, key: &KeyEvent) -> EditorKeyOutcome {
        if key.code == KeyCode::Char(' ') && key.modifiers.is_plain() {
            self.value = !self.value;
            return EditorKeyOutcome::Consumed;
        }
        EditorKeyOutcome::Ignored
    }
}

#[cfg(test)]
mod tests {
    use vgrid_core::data::Record;

    use super::*;

    fn loaded(initial: &str) -> TextInputEditor {
        let mut editor = TextInputEditor::new("name");
        let item = Record::new().with("name", initial);
        editor.load_value(&item);
        editor
    }

    fn press(editor: &mut dyn CellEditor, code: KeyCode) -> EditorKeyOutcome {
        editor.handle_key(&KeyEvent::new(code))
    }

    #[test]
    fn caret_editing_handles_wide_chars() {
        let mut editor = loaded("你好");
        assert_eq!(editor.cursor(), Some(2));

        press(&mut editor, KeyCode::Home);
        press(&mut editor, KeyCode::Right);
        press(&mut editor, KeyCode::Char('a'));
        assert_eq!(editor.text(), "你a好");

        press(&mut editor, KeyCode::Backspace);
        press(&mut editor, KeyCode::Delete);
        assert_eq!(editor.text(), "你");
        assert!(editor.is_value_changed());
    }

    #[test]
    fn unknown_keys_fall_through_to_the_grid() {
        let mut editor = loaded("x");
        assert_eq!(press(&mut editor, KeyCode::Enter), EditorKeyOutcome::Ignored);
        assert_eq!(press(&mut editor, KeyCode::Tab), EditorKeyOutcome::Ignored);
        assert_eq!(press(&mut editor, KeyCode::Esc), EditorKeyOutcome::Ignored);
    }

    #[test]
    fn validator_flags_bad_input() {
        let validator: Validator = Rc::new(|s: &str| {
            if s.parse::<i64>().is_ok() {
                Validation::Valid
            } else {
                Validation::Invalid("not a number".to_string())
            }
        });
        let mut editor = TextInputEditor::new("score").with_validator(validator);
        editor.load_value(&Record::new().with("score", 10i64));
        assert_eq!(editor.validate(), Validation::Valid);

        press(&mut editor, KeyCode::Char('x'));
        assert_eq!(
            editor.validate(),
            Validation::Invalid("not a number".to_string())
        );
    }

    #[test]
    fn checkbox_toggles_and_coerces() {
        let mut editor = CheckboxEditor::new("done");
        editor.load_value(&Record::new().with("done", 1i64));
        assert_eq!(editor.text(), "[x]");
        assert!(!editor.is_value_changed());

        assert_eq!(press(&mut editor, KeyCode::Char(' ')), EditorKeyOutcome::Consumed);
        assert_eq!(editor.serialize_value(), CellValue::Bool(false));
        assert!(editor.is_value_changed());
        assert_eq!(press(&mut editor, KeyCode::Char('z')), EditorKeyOutcome::Ignored);

        editor.load_value(&Record::new().with("done", "true"));
        assert_eq!(editor.serialize_value(), CellValue::Bool(true));
    }
}
