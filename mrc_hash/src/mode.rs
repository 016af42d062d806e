// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::Deserialize;

/// Reports whether the current boot is a recovery boot
pub trait ModeOracle {
    fn is_recovery_mode(&self) -> bool;
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BootMode {
    #[default]
    Normal,
    Recovery,
}

impl ModeOracle for BootMode {
    fn is_recovery_mode(&self) -> bool {
        *self == BootMode::Recovery
    }
}

impl<M: ModeOracle + ?Sized> ModeOracle for &M {
    fn is_recovery_mode(&self) -> bool {
        (**self).is_recovery_mode()
    }
}
