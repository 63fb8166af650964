#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    Admin = 1,
    Hr = 2,
    Employee = 3,
    System = 4,
    /// Face-capture terminal that submits recognition events.
    Kiosk = 5,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Hr),
            3 => Some(Role::Employee),
            4 => Some(Role::System),
            5 => Some(Role::Kiosk),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Roles allowed to push recognition events into the engine.
    pub fn submits_events(self) -> bool {
        matches!(self, Role::Admin | Role::System | Role::Kiosk)
    }

    pub fn reads_reports(self) -> bool {
        matches!(self, Role::Admin | Role::Hr)
    }
}
