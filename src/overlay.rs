/// Modal dialogs reachable from the user menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalKind {
    Profile,
    Password,
    Preferences,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    UserMenu,
    /// The more-menu of one sidebar item.
    SessionMenu(String),
    Modal(ModalKind),
}

impl Overlay {
    pub fn is_menu(&self) -> bool {
        !matches!(self, Overlay::Modal(_))
    }
}

/// At most one overlay is open at any time; opening one closes the other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayState {
    active: Option<Overlay>,
}

impl OverlayState {
    pub fn active(&self) -> Option<&Overlay> {
        self.active.as_ref()
    }

    pub fn is_open(&self, overlay: &Overlay) -> bool {
        self.active.as_ref() == Some(overlay)
    }

    pub fn open(&mut self, overlay: Overlay) {
        if let Some(previous) = self.active.replace(overlay) {
            log::debug!("Closing {:?}", previous);
        }
    }

    pub fn toggle(&mut self, overlay: Overlay) {
        if self.is_open(&overlay) {
            self.active = None;
        } else {
            self.open(overlay);
        }
    }

    /// Closes `overlay` if it is the open one.
    pub fn close(&mut self, overlay: &Overlay) {
        if self.is_open(overlay) {
            self.active = None;
        }
    }

    /// A click that landed outside every menu. Modals stay open.
    pub fn click_outside(&mut self) {
        if self.active.as_ref().is_some_and(Overlay::is_menu) {
            self.active = None;
        }
    }

    /// The pointer left a sidebar item; its menu closes.
    pub fn mouse_leave(&mut self, session_id: &str) {
        if matches!(&self.active, Some(Overlay::SessionMenu(id)) if id == session_id) {
            self.active = None;
        }
    }
}
