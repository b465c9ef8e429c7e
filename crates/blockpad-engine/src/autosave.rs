//! Debounced persistence. The engine does not know where content goes;
//! the host installs a save callback and the debounce coalesces rapid
//! edits into at most one write per quiet window. A failed save stays
//! dirty and is retried on the next flush.

use std::time::{Duration, Instant};

pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_millis(2000);

pub type SaveFn = Box<dyn FnMut(&str) -> anyhow::Result<()>>;

pub(crate) struct Autosave {
    delay: Duration,
    deadline: Option<Instant>,
    dirty: bool,
    save: Option<SaveFn>,
}

impl Autosave {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            dirty: false,
            save: None,
        }
    }

    pub(crate) fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    pub(crate) fn set_save_fn(&mut self, save: Option<SaveFn>) {
        self.save = save;
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Reset (not extend) the quiet window.
    pub(crate) fn mark_dirty(&mut self, now: Instant) {
        self.dirty = true;
        self.deadline = Some(now + self.delay);
    }

    /// Save if the quiet window has elapsed. Returns whether a save ran
    /// and succeeded.
    pub(crate) fn poll(&mut self, now: Instant, content: &str) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => self.flush(content),
            _ => false,
        }
    }

    /// Save immediately if dirty.
    pub(crate) fn flush(&mut self, content: &str) -> bool {
        if !self.dirty {
            return false;
        }
        let Some(save) = self.save.as_mut() else {
            return false;
        };
        match save(content) {
            Ok(()) => {
                self.dirty = false;
                self.deadline = None;
                true
            }
            Err(err) => {
                log::warn!("autosave failed, will retry: {err:#}");
                false
            }
        }
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    const DELAY: Duration = Duration::from_millis(100);

    fn recording() -> (Autosave, Rc<RefCell<Vec<String>>>) {
        let saves = Rc::new(RefCell::new(Vec::new()));
        let sink = saves.clone();
        let mut autosave = Autosave::new(DELAY);
        autosave.set_save_fn(Some(Box::new(move |content: &str| {
            sink.borrow_mut().push(content.to_string());
            Ok(())
        })));
        (autosave, saves)
    }

    #[test]
    fn test_rapid_edits_coalesce_to_one_save() {
        let (mut autosave, saves) = recording();
        let start = Instant::now();
        for i in 0..5 {
            autosave.mark_dirty(start + Duration::from_millis(i * 10));
        }
        // Window measured from the *last* edit.
        assert!(!autosave.poll(start + Duration::from_millis(120), "v5"));
        assert!(autosave.poll(start + Duration::from_millis(140), "v5"));
        assert_eq!(*saves.borrow(), vec!["v5".to_string()]);
        assert!(!autosave.is_dirty());
        // Nothing further without new edits.
        assert!(!autosave.poll(start + Duration::from_secs(10), "v5"));
    }

    #[test]
    fn test_flush_saves_immediately() {
        let (mut autosave, saves) = recording();
        autosave.mark_dirty(Instant::now());
        assert!(autosave.flush("now"));
        assert_eq!(*saves.borrow(), vec!["now".to_string()]);
        assert!(!autosave.flush("again"));
        assert_eq!(saves.borrow().len(), 1);
    }

    #[test]
    fn test_failed_save_stays_dirty() {
        let mut autosave = Autosave::new(DELAY);
        let attempts = Rc::new(RefCell::new(0));
        let counter = attempts.clone();
        autosave.set_save_fn(Some(Box::new(move |_: &str| {
            *counter.borrow_mut() += 1;
            anyhow::bail!("disk full")
        })));
        autosave.mark_dirty(Instant::now());
        assert!(!autosave.flush("content"));
        assert!(autosave.is_dirty());
        assert!(!autosave.flush("content"));
        assert_eq!(*attempts.borrow(), 2);
    }

    #[test]
    fn test_no_save_fn_is_a_noop() {
        let mut autosave = Autosave::new(DELAY);
        autosave.mark_dirty(Instant::now());
        assert!(!autosave.flush("content"));
        assert!(autosave.is_dirty());
    }
}
