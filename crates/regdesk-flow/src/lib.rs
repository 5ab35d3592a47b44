// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod dialog;
pub mod list;
pub mod screen;

pub use dialog::{
    CLOSE_DELAY, DialogPhase, MutationDialogController, MutationOutcome, MutationTicket, Prefill,
    RefreshSignal,
};
pub use list::{EntityListController, ListEvent, ListPhase, LoadKind, LoadTicket};
pub use screen::ScreenSession;
