//! Cell editing: the shared editor lock, the editor seam, and the edit
//! session that drives one editor's lifecycle.
//!
//! Only one edit may be active across every grid sharing an
//! [`EditorLock`]. A session performs the editor-level work (validate,
//! serialize, destroy) synchronously and queues [`EditOutcome`] micro-ops;
//! the owning grid drains those at its next entry point and performs the
//! grid-level work (apply values, fire notifications, re-render). That
//! split keeps commits triggered from inside the lock re-entrant safe.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::rc::Weak;

use log::debug;
use thiserror::Error;

use crate::data::CellValue;
use crate::data::GridItem;
use crate::input::KeyEvent;

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum LockError {
    #[error("another edit controller already holds the lock")]
    AlreadyActive,
    #[error("controller does not hold the lock")]
    NotHolder,
}

/// A party able to finish or abandon its active edit on demand.
pub trait EditController {
    /// Returns false when the edit could not be committed (validation
    /// failed); the controller keeps the lock in that case.
    fn commit_current_edit(&mut self) -> bool;

    fn cancel_current_edit(&mut self) -> bool;
}

pub type ControllerHandle = Rc<RefCell<dyn EditController>>;

/// Reusable mutex-like gate over "there is one active cell edit".
/// Share one instance across grids that must not edit concurrently.
#[derive(Default)]
pub struct EditorLock {
    holder: RefCell<Option<ControllerHandle>>,
}

impl EditorLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.holder.borrow().is_some()
    }

    pub fn is_holder(&self, controller: &ControllerHandle) -> bool {
        self.holder
            .borrow()
            .as_ref()
            .is_some_and(|h| std::ptr::addr_eq(Rc::as_ptr(h), Rc::as_ptr(controller)))
    }

    /// Take the lock. Re-activating by the current holder is a no-op.
    pub fn activate(&self, controller: ControllerHandle) -> Result<(), LockError> {
        let mut holder = self.holder.borrow_mut();
        match holder.as_ref() {
            Some(h) if std::ptr::addr_eq(Rc::as_ptr(h), Rc::as_ptr(&controller)) => Ok(()),
            Some(_) => Err(LockError::AlreadyActive),
            None => {
                *holder = Some(controller);
                Ok(())
            }
        }
    }

    pub fn deactivate(&self, controller: &ControllerHandle) -> Result<(), LockError> {
        let mut holder = self.holder.borrow_mut();
        match holder.as_ref() {
            Some(h) if std::ptr::addr_eq(Rc::as_ptr(h), Rc::as_ptr(controller)) => {
                *holder = None;
                Ok(())
            }
            _ => Err(LockError::NotHolder),
        }
    }

    /// Ask the holder to commit. True when idle or the commit succeeded.
    /// The holder may deactivate from inside its commit.
    pub fn commit_current_edit(&self) -> bool {
        let holder = self.holder.borrow().clone();
        match holder {
            Some(controller) => controller.borrow_mut().commit_current_edit(),
            None => true,
        }
    }

    pub fn cancel_current_edit(&self) -> bool {
        let holder = self.holder.borrow().clone();
        match holder {
            Some(controller) => controller.borrow_mut().cancel_current_edit(),
            None => true,
        }
    }
}

/// Editor validation result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Invalid(String),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }
}

/// How an editor responded to a keystroke.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditorKeyOutcome {
    Consumed,
    /// Not handled; the grid applies its own key bindings.
    Ignored,
}

/// Cell rectangle an editor is placed over, in canvas coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CellBox {
    pub row: usize,
    pub cell: usize,
    pub top: i64,
    pub left: u64,
    pub width: u32,
    pub height: u32,
    pub visible: bool,
}

/// An in-cell editor. Editors hold their working state themselves; the
/// widget paints them via [`CellEditor::text`] and [`CellEditor::cursor`].
pub trait CellEditor {
    fn load_value(&mut self, item: &dyn GridItem);

    fn serialize_value(&self) -> CellValue;

    /// Write a serialized value into an item. Must stay callable after
    /// [`CellEditor::destroy`]; edit commands replay it for undo.
    fn apply_value(&self, item: &mut dyn GridItem, value: &CellValue);

    fn is_value_changed(&self) -> bool;

    fn validate(&self) -> Validation;

    /// Current display text for painting.
    fn text(&self) -> String;

    /// Caret offset into [`CellEditor::text`], when the editor has one.
    fn cursor(&self) -> Option<usize> {
        None
    }

    fn handle_key(&mut self, key: &KeyEvent) -> EditorKeyOutcome {
        let _ = key;
        EditorKeyOutcome::Ignored
    }

    /// The cell moved; reposition any out-of-band chrome.
    fn position(&mut self, cell_box: &CellBox) {
        let _ = cell_box;
    }

    fn show(&mut self) {}

    fn hide(&mut self) {}

    fn destroy(&mut self) {}
}

/// Construction context handed to an [`EditorFactory`].
pub struct EditorArgs<'a> {
    pub row: usize,
    pub cell: usize,
    pub column: &'a crate::column::Column,
    /// None on the add-new row.
    pub item: Option<&'a dyn GridItem>,
    pub position: CellBox,
}

/// Injectable editor constructor, resolved per cell.
pub trait EditorFactory {
    fn make(&self, args: &EditorArgs<'_>) -> Box<dyn CellEditor>;
}

impl<F> EditorFactory for F
where
    F: Fn(&EditorArgs<'_>) -> Box<dyn CellEditor>,
{
    fn make(&self, args: &EditorArgs<'_>) -> Box<dyn CellEditor> {
        self(args)
    }
}

/// A committed edit, replayable in both directions. Owns the (destroyed)
/// editor so `execute`/`undo` keep working after the session ends.
pub struct EditCommand {
    pub row: usize,
    pub cell: usize,
    editor: Box<dyn CellEditor>,
    pub serialized: CellValue,
    pub prev_serialized: CellValue,
}

impl EditCommand {
    pub fn execute(&self, item: &mut dyn GridItem) {
        self.editor.apply_value(item, &self.serialized);
    }

    pub fn undo(&self, item: &mut dyn GridItem) {
        self.editor.apply_value(item, &self.prev_serialized);
    }
}

/// Grid-level work queued by a session, drained in order by the grid.
pub enum EditOutcome {
    /// Apply the command to the data, or hand it to the configured edit
    /// command handler.
    Apply(EditCommand),
    /// The editor was destroyed; refresh the cell and notify.
    Closed { row: usize, cell: usize },
    /// The committed value landed; notify and refresh the row.
    Changed { row: usize, cell: usize },
    /// A commit on the add-new row produced a value; the data source
    /// decides whether to grow.
    AddNew { column_id: String, value: CellValue },
    /// Validation rejected the value; the editor stays open.
    Invalid {
        row: usize,
        cell: usize,
        message: String,
    },
}

pub struct EditSessionArgs {
    pub row: usize,
    pub cell: usize,
    pub column_id: String,
    pub is_add_new: bool,
    /// An edit command handler is configured; the grid applies commands
    /// after close instead of the session path applying before.
    pub defer_apply: bool,
}

/// One editor's lifecycle, from activation to close. Implements
/// [`EditController`] so a shared [`EditorLock`] can drive it.
pub struct EditSession {
    row: usize,
    cell: usize,
    column_id: String,
    is_add_new: bool,
    defer_apply: bool,
    editor: Option<Box<dyn CellEditor>>,
    prev_serialized: CellValue,
    outcomes: VecDeque<EditOutcome>,
    lock: Rc<EditorLock>,
    self_handle: Weak<RefCell<EditSession>>,
}

impl EditSession {
    /// Activate the lock and wrap a prepared editor (already loaded with
    /// the item value) in a session.
    pub fn begin(
        args: EditSessionArgs,
        editor: Box<dyn CellEditor>,
        lock: &Rc<EditorLock>,
    ) -> Result<Rc<RefCell<EditSession>>, LockError> {
        let prev_serialized = editor.serialize_value();
        let session = Rc::new_cyclic(|weak: &Weak<RefCell<EditSession>>| {
            RefCell::new(EditSession {
                row: args.row,
                cell: args.cell,
                column_id: args.column_id,
                is_add_new: args.is_add_new,
                defer_apply: args.defer_apply,
                editor: Some(editor),
                prev_serialized,
                outcomes: VecDeque::new(),
                lock: lock.clone(),
                self_handle: weak.clone(),
            })
        });
        let controller: ControllerHandle = session.clone();
        if let Err(err) = lock.activate(controller) {
            if let Some(mut editor) = session.borrow_mut().editor.take() {
                editor.destroy();
            }
            return Err(err);
        }
        debug!("edit session opened at ({}, {})", args.row, args.cell);
        Ok(session)
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn cell(&self) -> usize {
        self.cell
    }

    pub fn is_add_new(&self) -> bool {
        self.is_add_new
    }

    /// False once the editor closed; the grid drops the session after
    /// draining its outcomes.
    pub fn has_editor(&self) -> bool {
        self.editor.is_some()
    }

    pub fn editor(&self) -> Option<&dyn CellEditor> {
        self.editor.as_deref()
    }

    pub fn editor_mut(&mut self) -> Option<&mut (dyn CellEditor + 'static)> {
        self.editor.as_deref_mut()
    }

    pub fn load_item(&mut self, item: &dyn GridItem) {
        if let Some(editor) = self.editor.as_mut() {
            editor.load_value(item);
        }
    }

    pub fn take_outcomes(&mut self) -> Vec<EditOutcome> {
        self.outcomes.drain(..).collect()
    }

    pub fn commit(&mut self) -> bool {
        self.do_commit()
    }

    pub fn cancel(&mut self) -> bool {
        self.do_cancel()
    }

    fn do_commit(&mut self) -> bool {
        let Some(editor) = self.editor.as_mut() else {
            return true;
        };
        if !editor.is_value_changed() {
            self.close_editor();
            return true;
        }
        match editor.validate() {
            Validation::Invalid(message) => {
                self.outcomes.push_back(EditOutcome::Invalid {
                    row: self.row,
                    cell: self.cell,
                    message,
                });
                false
            }
            Validation::Valid => {
                let serialized = editor.serialize_value();
                if self.is_add_new {
                    let column_id = self.column_id.clone();
                    self.close_editor();
                    self.outcomes.push_back(EditOutcome::AddNew {
                        column_id,
                        value: serialized,
                    });
                    return true;
                }
                let mut editor = match self.editor.take() {
                    Some(editor) => editor,
                    None => return true,
                };
                editor.destroy();
                self.release_lock();
                let command = EditCommand {
                    row: self.row,
                    cell: self.cell,
                    editor,
                    serialized,
                    prev_serialized: self.prev_serialized.clone(),
                };
                if self.defer_apply {
                    self.outcomes.push_back(EditOutcome::Closed {
                        row: self.row,
                        cell: self.cell,
                    });
                    self.outcomes.push_back(EditOutcome::Apply(command));
                } else {
                    self.outcomes.push_back(EditOutcome::Apply(command));
                    self.outcomes.push_back(EditOutcome::Closed {
                        row: self.row,
                        cell: self.cell,
                    });
                }
                self.outcomes.push_back(EditOutcome::Changed {
                    row: self.row,
                    cell: self.cell,
                });
                true
            }
        }
    }

    fn do_cancel(&mut self) -> bool {
        if self.editor.is_some() {
            self.close_editor();
        }
        true
    }

    /// Destroy the editor, release the lock, and queue the close.
    fn close_editor(&mut self) {
        if let Some(mut editor) = self.editor.take() {
            editor.destroy();
        }
        self.release_lock();
        self.outcomes.push_back(EditOutcome::Closed {
            row: self.row,
            cell: self.cell,
        });
    }

    fn release_lock(&self) {
        if let Some(session) = self.self_handle.upgrade() {
            let controller: ControllerHandle = session;
            let _ = self.lock.deactivate(&controller);
        }
    }
}

impl EditController for EditSession {
    fn commit_current_edit(&mut self) -> bool {
        self.do_commit()
    }

    fn cancel_current_edit(&mut self) -> bool {
        self.do_cancel()
    }
}
