//! Hostility: whether two unit groups sharing a territory must fight.

use crate::board::{FactionId, UnitAction};

use super::relations::RelationTable;

/// One side of a potential engagement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Combatant {
    pub faction: Option<FactionId>,
    /// `None` for stationary units.
    pub action: Option<UnitAction>,
}

impl Combatant {
    pub fn new(faction: Option<FactionId>, action: Option<UnitAction>) -> Self {
        Combatant { faction, action }
    }

    fn is_raiding(&self) -> bool {
        self.action == Some(UnitAction::Raid)
    }
}

/// Decides whether `a` and `b`, meeting in a territory controlled by
/// `controller`, are hostile.
///
/// Same-faction and unaffiliated pairs never are. Otherwise they are hostile
/// when on opposite sides of a shared war, or when one side raids and the
/// other is the controller or one of its allies.
pub fn is_hostile(
    a: &Combatant,
    b: &Combatant,
    controller: Option<FactionId>,
    relations: &RelationTable,
) -> bool {
    let (Some(fa), Some(fb)) = (a.faction, b.faction) else {
        return false;
    };
    if fa == fb {
        return false;
    }
    if relations.at_war(fa, fb) {
        return true;
    }
    let defends = |faction: FactionId| {
        controller.is_some_and(|c| relations.are_allied(c, faction))
    };
    (a.is_raiding() && defends(fb)) || (b.is_raiding() && defends(fa))
}
