//! Faction relations: who is allied with whom, who is at war with whom.
//!
//! Loaded once per phase from the faction, alliance, war and membership
//! records.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::board::{
    Alliance, AllianceStatus, CharacterId, Controller, Faction, FactionId, FactionMember, GuildId, Owner,
    Unit, War, WarId, WarParticipant, WarSide,
};
use crate::store::{StoreError, WorldStore};

#[derive(Debug, Clone, Default)]
pub struct RelationTable {
    allies: HashMap<FactionId, BTreeSet<FactionId>>,
    wars: BTreeMap<WarId, [BTreeSet<FactionId>; 2]>,
    membership: HashMap<CharacterId, FactionId>,
    leaders: HashMap<FactionId, CharacterId>,
}

fn side_index(side: WarSide) -> usize {
    match side {
        WarSide::SideA => 0,
        WarSide::SideB => 1,
    }
}

impl RelationTable {
    pub fn load(store: &dyn WorldStore, guild: GuildId) -> Result<Self, StoreError> {
        Ok(Self::from_records(
            &store.alliances(guild)?,
            &store.wars(guild)?,
            &store.war_participants(guild)?,
            &store.faction_members(guild)?,
        )
        .with_leaders(&store.factions(guild)?))
    }

    /// Records each faction's leader.
    pub fn with_leaders(mut self, factions: &[Faction]) -> Self {
        self.leaders = factions.iter().filter_map(|f| Some((f.id, f.leader?))).collect();
        self
    }

    pub fn leader(&self, faction: FactionId) -> Option<CharacterId> {
        self.leaders.get(&faction).copied()
    }

    /// Builds the table. Pending alliances and participants of unknown wars
    /// are ignored.
    pub fn from_records(
        alliances: &[Alliance],
        wars: &[War],
        participants: &[WarParticipant],
        members: &[FactionMember],
    ) -> Self {
        let mut table = RelationTable::default();

        for alliance in alliances.iter().filter(|a| a.status == AllianceStatus::Active) {
            table.allies.entry(alliance.faction_a).or_default().insert(alliance.faction_b);
            table.allies.entry(alliance.faction_b).or_default().insert(alliance.faction_a);
        }

        for war in wars {
            table.wars.insert(war.id, Default::default());
        }
        for p in participants {
            if let Some(sides) = table.wars.get_mut(&p.war) {
                sides[side_index(p.side)].insert(p.faction);
            }
        }

        for m in members {
            table.membership.insert(m.character, m.faction);
        }
        table
    }

    /// The faction plus its active alliance partners.
    pub fn allied_set(&self, faction: FactionId) -> BTreeSet<FactionId> {
        let mut set = self.allies.get(&faction).cloned().unwrap_or_default();
        set.insert(faction);
        set
    }

    /// Every faction on the opposite side of any war the faction is in.
    pub fn enemy_set(&self, faction: FactionId) -> BTreeSet<FactionId> {
        let mut enemies = BTreeSet::new();
        for sides in self.wars.values() {
            for (ours, theirs) in [(0, 1), (1, 0)] {
                if sides[ours].contains(&faction) {
                    enemies.extend(sides[theirs].iter().copied());
                }
            }
        }
        enemies.remove(&faction);
        enemies
    }

    pub fn are_allied(&self, a: FactionId, b: FactionId) -> bool {
        a == b || self.allies.get(&a).is_some_and(|set| set.contains(&b))
    }

    /// True if the factions sit on opposite sides of at least one war.
    pub fn at_war(&self, a: FactionId, b: FactionId) -> bool {
        a != b
            && self.wars.values().any(|sides| {
                (sides[0].contains(&a) && sides[1].contains(&b))
                    || (sides[1].contains(&a) && sides[0].contains(&b))
            })
    }

    pub fn character_faction(&self, character: CharacterId) -> Option<FactionId> {
        self.membership.get(&character).copied()
    }

    /// Explicit unit faction, else the owning faction, else the owning
    /// character's faction.
    pub fn home_faction(&self, unit: &Unit) -> Option<FactionId> {
        unit.faction.or(match unit.owner {
            Owner::Faction(f) => Some(f),
            Owner::Character(c) => self.character_faction(c),
        })
    }

    /// The faction a territory controller answers to.
    pub fn controller_faction(&self, controller: Option<Controller>) -> Option<FactionId> {
        match controller? {
            Controller::Faction(f) => Some(f),
            Controller::Character(c) => self.character_faction(c),
        }
    }
}
