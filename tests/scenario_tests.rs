//! End-to-end turn scenarios against the in-memory store.
//!
//! Each test builds a small world, submits orders, resolves one or more
//! turns through [`Engine`] and inspects the persisted state and the events
//! of the turn report.

use serde_json::{json, Value};
use turnwright::board::{
    CharacterId, Controller, EventData, FactionId, GuildConfig, GuildId, LandProgress,
    MovementStatus, Order, OrderId, OrderStatus, Owner, Phase, Territory, TerritoryId, TurnLog, Unit,
    UnitId, WarId,
};
use turnwright::store::{InMemoryStore, WorldStore};
use turnwright::{Engine, TurnReport};

const GUILD: GuildId = GuildId(1);
const RED: FactionId = FactionId(1);
const BLUE: FactionId = FactionId(2);
const GREEN: FactionId = FactionId(3);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct World {
    store: InMemoryStore,
    engine: Engine,
}

impl World {
    fn new() -> Self {
        init_tracing();
        let mut store = InMemoryStore::new();
        store.set_guild_config(GUILD, GuildConfig::default());
        World { store, engine: Engine::default() }
    }

    fn territory(&mut self, id: &str, terrain: &str) -> &mut Self {
        self.store.insert_territory(GUILD, Territory::new(id, terrain));
        self
    }

    fn held(&mut self, id: &str, terrain: &str, faction: FactionId) -> &mut Self {
        let territory = Territory::new(id, terrain).controlled_by(Controller::Faction(faction));
        self.store.insert_territory(GUILD, territory);
        self
    }

    fn link(&mut self, a: &str, b: &str) -> &mut Self {
        self.store.connect(GUILD, a, b);
        self
    }

    fn war(&mut self) -> &mut Self {
        self.store.declare_war(GUILD, WarId(1), &[RED], &[BLUE]);
        self
    }

    fn add(&mut self, unit: Unit) -> &mut Self {
        self.store.insert_unit(GUILD, unit);
        self
    }

    fn order(&mut self, id: i64, units: &[i64], data: Value) -> &mut Self {
        let ids = units.iter().map(|&u| UnitId(u)).collect();
        self.store.insert_order(GUILD, Order::unit(OrderId(id), CharacterId(1), ids, data));
        self
    }

    fn turn(&mut self) -> TurnReport {
        let report = self.engine.resolve_turn(&mut self.store, GUILD).unwrap();
        assert!(report.success, "{}", report.message);
        report
    }

    fn order_state(&self, id: i64) -> Order {
        self.store.order(GUILD, OrderId(id)).unwrap().unwrap()
    }

    fn unit(&self, id: i64) -> Unit {
        self.store.unit(GUILD, UnitId(id)).unwrap().unwrap()
    }
}

fn soldier(id: i64, faction: FactionId, at: &str) -> Unit {
    Unit::new(UnitId(id), Owner::Faction(faction), at)
}

fn ship(id: i64, faction: FactionId, at: &str, movement: u32) -> Unit {
    let mut unit = Unit::new(UnitId(id), Owner::Faction(faction), at);
    unit.is_naval = true;
    unit.movement = movement;
    unit
}

fn of_type<'a>(events: &'a [TurnLog], event_type: &str) -> Vec<&'a TurnLog> {
    events.iter().filter(|e| e.event_type() == event_type).collect()
}

fn engagements(events: &[TurnLog]) -> Vec<(String, Vec<String>, bool)> {
    events
        .iter()
        .filter_map(|e| match &e.data {
            EventData::EngagementDetected { territory, units, interception, .. } => {
                Some((territory.to_string(), units.clone(), *interception))
            }
            _ => None,
        })
        .collect()
}

/// a - b - c - d, all plains.
fn corridor() -> World {
    let mut world = World::new();
    world
        .territory("a", "plains")
        .territory("b", "plains")
        .territory("c", "plains")
        .territory("d", "plains")
        .link("a", "b")
        .link("b", "c")
        .link("c", "d");
    world
}

#[test]
fn warring_groups_meeting_engage_once_each() {
    let mut world = corridor();
    world
        .war()
        .add(soldier(1, RED, "a"))
        .add(soldier(2, BLUE, "c"))
        .order(1, &[1], json!({"action": "transit", "path": ["a", "b"]}))
        .order(2, &[2], json!({"action": "transit", "path": ["c", "b"]}));

    let report = world.turn();
    let found = engagements(&report.events);
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|(t, _, interception)| t == "b" && !interception));

    for id in [1, 2] {
        let progress = LandProgress::from_result(&world.order_state(id).result_data);
        assert_eq!(progress.status, Some(MovementStatus::Engaged));
    }
    assert!(world.unit(1).is_in(&"b".into()));
    assert!(world.unit(2).is_in(&"b".into()));
}

#[test]
fn co_located_factions_without_war_pass_each_other() {
    let mut world = corridor();
    world
        .add(soldier(1, RED, "a"))
        .add(soldier(2, BLUE, "c"))
        .order(1, &[1], json!({"action": "transit", "path": ["a", "b", "c"]}))
        .order(2, &[2], json!({"action": "transit", "path": ["c", "b", "a"]}));

    let report = world.turn();
    assert!(engagements(&report.events).is_empty());
    assert_eq!(world.order_state(1).status, OrderStatus::Success);
    assert_eq!(world.order_state(2).status, OrderStatus::Success);
    assert_eq!(of_type(&report.events, "TRANSIT_COMPLETE").len(), 2);
}

#[test]
fn raid_into_defended_territory_engages_without_war() {
    let mut world = World::new();
    world
        .territory("a", "plains")
        .held("b", "plains", BLUE)
        .link("a", "b")
        .add(soldier(1, RED, "a"))
        .add(soldier(2, BLUE, "b"))
        .order(1, &[1], json!({"action": "raid", "path": ["a", "b"]}));

    let report = world.turn();
    let found = engagements(&report.events);
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].0, "b");
}

#[test]
fn group_engages_every_hostile_faction_it_meets() {
    let mut world = corridor();
    world.war();
    world.store.declare_war(GUILD, WarId(2), &[RED], &[GREEN]);
    world
        .add(soldier(1, RED, "a"))
        .add(soldier(2, BLUE, "b"))
        .add(soldier(3, GREEN, "b"))
        .order(1, &[1], json!({"action": "transit", "path": ["a", "b", "c"]}));

    let report = world.turn();
    let found = engagements(&report.events);
    assert_eq!(found.len(), 4);
    assert!(found.iter().all(|(t, _, _)| t == "b"));
    let sides: Vec<Vec<String>> = found.into_iter().map(|(_, units, _)| units).collect();
    assert_eq!(sides.iter().filter(|u| *u == &vec!["U-1".to_string()]).count(), 2);
    assert!(sides.contains(&vec!["U-2".to_string()]));
    assert!(sides.contains(&vec!["U-3".to_string()]));

    let progress = LandProgress::from_result(&world.order_state(1).result_data);
    assert_eq!(progress.status, Some(MovementStatus::Engaged));
    assert!(world.unit(1).is_in(&"b".into()));
}

#[test]
fn patrol_intercepts_lowest_adjacent_hostile() {
    let mut world = World::new();
    world
        .territory("w", "plains")
        .territory("x", "plains")
        .territory("y", "plains")
        .territory("z", "plains")
        .link("x", "w")
        .link("x", "y")
        .link("x", "z")
        .war()
        .add(soldier(1, RED, "x"))
        .add(soldier(2, BLUE, "y"))
        .add(soldier(3, BLUE, "z"))
        .order(1, &[1], json!({"action": "patrol", "path": ["x", "w"]}));

    let report = world.turn();
    let found = engagements(&report.events);
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|(t, _, interception)| t == "y" && *interception));
    assert!(found.iter().any(|(_, units, _)| units == &vec!["U-2".to_string()]));
    assert!(!found.iter().any(|(_, units, _)| units.contains(&"U-3".to_string())));

    assert!(world.unit(1).is_in(&"y".into()));
    assert_eq!(world.order_state(1).status, OrderStatus::Ongoing);
}

#[test]
fn patrol_wraps_and_never_completes() {
    let mut world = corridor();
    let mut scout = soldier(1, RED, "a");
    scout.movement = 3;
    world.add(scout).order(1, &[1], json!({"action": "patrol", "path": ["a", "b"]}));

    for _ in 0..3 {
        let report = world.turn();
        assert!(of_type(&report.events, "TRANSIT_COMPLETE").is_empty());
        assert_eq!(world.order_state(1).status, OrderStatus::Ongoing);
    }
    // Three steps per turn over a two-territory loop: b, a, b.
    assert!(world.unit(1).is_in(&"b".into()));
    let progress = LandProgress::from_result(&world.order_state(1).result_data);
    assert_eq!(progress.path_index, 1);
    assert_eq!(progress.steps_taken, 3);
}

#[test]
fn patrol_route_must_close_back_to_its_start() {
    let mut world = corridor();
    let mut scout = soldier(1, RED, "a");
    scout.movement = 5;
    world.add(scout).order(1, &[1], json!({"action": "patrol", "path": ["a", "b", "c"]}));

    let report = world.turn();
    let order = world.order_state(1);
    assert_eq!(order.status, OrderStatus::Failed);
    assert_eq!(order.result_data["error"], "c is not adjacent to a");
    assert_eq!(of_type(&report.events, "ORDER_FAILED").len(), 1);
    assert!(world.unit(1).is_in(&"a".into()));
}

#[test]
fn unaffordable_terrain_leaves_group_in_place() {
    let mut world = World::new();
    world
        .territory("a", "plains")
        .territory("peak", "mountains")
        .link("a", "peak")
        .add(soldier(1, RED, "a"))
        .order(1, &[1], json!({"action": "transit", "path": ["a", "peak"]}));

    for turn in 1..=2 {
        let report = world.turn();
        let blocked = of_type(&report.events, "MOVEMENT_BLOCKED");
        assert_eq!(blocked.len(), 1, "turn {}", turn);
        match &blocked[0].data {
            EventData::MovementBlocked { blocked_at, cost, remaining_mp, .. } => {
                assert_eq!(blocked_at.as_str(), "peak");
                assert_eq!(*cost, 3);
                assert_eq!(*remaining_mp, 2);
            }
            other => panic!("unexpected payload {:?}", other),
        }
        let order = world.order_state(1);
        assert_eq!(order.status, OrderStatus::Ongoing);
        let progress = LandProgress::from_result(&order.result_data);
        assert_eq!(progress.path_index, 0);
        assert_eq!(progress.status, Some(MovementStatus::OutOfMp));
        assert!(world.unit(1).is_in(&"a".into()));
    }
}

#[test]
fn infiltrators_never_appear_in_engagements() {
    let mut world = corridor();
    let mut infiltrator = soldier(2, RED, "a");
    infiltrator.keywords.push("Infiltrator".into());
    let mut lone = soldier(3, RED, "c");
    lone.keywords.push("infiltrator".into());
    world
        .war()
        .add(soldier(1, RED, "a"))
        .add(infiltrator)
        .add(lone)
        .add(soldier(9, BLUE, "b"))
        .order(1, &[1, 2], json!({"action": "transit", "path": ["a", "b"]}))
        .order(2, &[3], json!({"action": "transit", "path": ["c", "b", "a"]}));

    let report = world.turn();
    let found = engagements(&report.events);
    assert_eq!(found.len(), 2);
    for (_, units, _) in &found {
        assert!(!units.contains(&"U-2".to_string()));
        assert!(!units.contains(&"U-3".to_string()));
    }
    assert_eq!(world.order_state(2).status, OrderStatus::Success);
    assert!(world.unit(3).is_in(&"a".into()));
}

#[test]
fn naval_convoy_holds_its_path() {
    let mut world = World::new();
    world
        .territory("port", "plains")
        .territory("s1", "sea")
        .territory("s2", "ocean")
        .link("port", "s1")
        .link("s1", "s2")
        .add(ship(1, RED, "s1", 2))
        .order(1, &[1], json!({"action": "naval_convoy", "path": ["s1", "s2"]}));

    let report = world.turn();
    assert_eq!(of_type(&report.events, "NAVAL_POSITION_SET").len(), 1);
    assert_eq!(world.order_state(1).status, OrderStatus::Success);
    let occupied = world.store.naval_positions(GUILD, UnitId(1)).unwrap();
    assert_eq!(occupied, vec![TerritoryId::from("s1"), TerritoryId::from("s2")]);
}

#[test]
fn naval_transit_slides_and_collapses() {
    let mut world = World::new();
    for id in ["s1", "s2", "s3", "s4", "s5"] {
        world.territory(id, "sea");
    }
    world
        .link("s1", "s2")
        .link("s2", "s3")
        .link("s3", "s4")
        .link("s4", "s5")
        .add(ship(1, RED, "s1", 1))
        .order(1, &[1], json!({"action": "naval_transit", "path": ["s1", "s2", "s3", "s4", "s5"]}));

    let expected: [(&[&str], OrderStatus); 3] = [
        (&["s1", "s2"], OrderStatus::Ongoing),
        (&["s3", "s4"], OrderStatus::Ongoing),
        (&["s5"], OrderStatus::Success),
    ];
    for (occupied, status) in expected {
        world.turn();
        let positions = world.store.naval_positions(GUILD, UnitId(1)).unwrap();
        let names: Vec<&str> = positions.iter().map(|t| t.as_str()).collect();
        assert_eq!(names, occupied);
        assert_eq!(world.order_state(1).status, status);
    }
}

#[test]
fn allied_convoy_breaks_encirclement() {
    let mut world = World::new();
    world
        .held("pocket", "plains", BLUE)
        .held("wall", "plains", BLUE)
        .territory("strait", "sea")
        .held("home", "plains", RED)
        .link("pocket", "wall")
        .link("pocket", "strait")
        .link("strait", "home")
        .war()
        .add(soldier(1, RED, "pocket"));

    let report = world.turn();
    let encircled = of_type(&report.events, "UNIT_ENCIRCLED");
    assert_eq!(encircled.len(), 1);
    assert_eq!(encircled[0].phase, Phase::Upkeep);

    world
        .add(ship(2, RED, "strait", 1))
        .order(1, &[2], json!({"action": "naval_convoy", "path": ["strait"]}));
    let report = world.turn();
    assert!(of_type(&report.events, "UNIT_ENCIRCLED").is_empty());
}

#[test]
fn land_group_boards_rides_and_lands() {
    let mut world = World::new();
    world
        .held("camp", "plains", RED)
        .held("port", "plains", RED)
        .territory("s1", "sea")
        .territory("s2", "sea")
        .territory("beach", "plains")
        .link("camp", "port")
        .link("port", "s1")
        .link("s1", "s2")
        .link("s2", "beach");
    let mut transport = ship(10, RED, "s1", 1);
    transport.capacity = 2;
    world
        .add(transport)
        .add(soldier(1, RED, "camp"))
        .order(1, &[10], json!({"action": "naval_transport", "path": ["s1", "s2"]}))
        .order(
            2,
            &[1],
            json!({"action": "transport", "path": ["camp", "port"], "water_path": ["s1", "s2"], "landing": "beach"}),
        );

    let report = world.turn();
    assert_eq!(of_type(&report.events, "NAVAL_WAITING").len(), 1);
    assert_eq!(of_type(&report.events, "TRANSPORT_BOARDED").len(), 1);
    assert!(world.unit(1).is_in(&"s1".into()));
    let progress = LandProgress::from_result(&world.order_state(2).result_data);
    assert!(progress.transported);
    assert_eq!(progress.transport_order, Some(OrderId(1)));

    let report = world.turn();
    assert_eq!(of_type(&report.events, "NAVAL_TRANSIT_PROGRESS").len(), 1);
    assert_eq!(world.order_state(2).status, OrderStatus::Ongoing);
    assert!(world.unit(1).is_in(&"s1".into()));

    let report = world.turn();
    assert_eq!(of_type(&report.events, "NAVAL_TRANSIT_COMPLETE").len(), 1);
    assert_eq!(of_type(&report.events, "TRANSIT_COMPLETE").len(), 1);
    assert_eq!(world.order_state(1).status, OrderStatus::Success);
    assert_eq!(world.order_state(2).status, OrderStatus::Success);
    assert!(world.unit(1).is_in(&"beach".into()));
}

#[test]
fn cargo_is_lost_with_its_transport() {
    let mut world = World::new();
    world
        .territory("port", "plains")
        .territory("s1", "sea")
        .territory("s2", "sea")
        .territory("beach", "plains")
        .link("port", "s1")
        .link("s1", "s2")
        .link("s2", "beach");
    let mut transport = ship(10, RED, "s1", 1);
    transport.capacity = 1;
    world
        .add(transport)
        .add(soldier(1, RED, "port"))
        .order(1, &[10], json!({"action": "naval_transport", "path": ["s1", "s2"]}))
        .order(
            2,
            &[1],
            json!({"action": "transport", "path": ["port"], "water_path": ["s1", "s2"], "landing": "beach"}),
        );
    world.turn();
    assert!(world.unit(1).is_in(&"s1".into()));

    let mut carrier = world.order_state(1);
    carrier.status = OrderStatus::Cancelled;
    world.store.save_order(GUILD, &carrier).unwrap();

    let report = world.turn();
    assert_eq!(of_type(&report.events, "TRANSPORT_LOST").len(), 1);
    assert_eq!(world.order_state(2).status, OrderStatus::Failed);
    assert!(!world.unit(1).is_active());
}

#[test]
fn missing_handler_fails_order_without_event() {
    let mut world = corridor();
    world
        .store
        .insert_order(GUILD, Order::new(OrderId(5), "MOBILIZATION", CharacterId(1), Phase::Construction));

    let report = world.turn();
    assert!(report.events.iter().all(|e| e.phase != Phase::Construction));
    let order = world.order_state(5);
    assert_eq!(order.status, OrderStatus::Failed);
    assert!(order.result_data["error"].as_str().unwrap().contains("MOBILIZATION"));
}

#[test]
fn store_failure_only_fails_its_order() {
    let mut world = corridor();
    world
        .add(soldier(1, RED, "a"))
        .add(soldier(2, RED, "c"))
        .order(1, &[1], json!({"action": "transit", "path": ["a", "b"]}))
        .order(2, &[2], json!({"action": "transit", "path": ["c", "d"]}));
    world.store.break_unit_writes(GUILD, UnitId(1));

    let report = world.turn();
    let failed = of_type(&report.events, "ORDER_FAILED");
    assert_eq!(failed.len(), 1);
    match &failed[0].data {
        EventData::OrderFailed { order_id, error } => {
            assert_eq!(*order_id, OrderId(1));
            assert!(error.contains("store backend failure"));
        }
        other => panic!("unexpected payload {:?}", other),
    }
    assert_eq!(world.order_state(1).status, OrderStatus::Failed);
    assert_eq!(world.order_state(2).status, OrderStatus::Success);
    assert!(world.unit(2).is_in(&"d".into()));
}

#[test]
fn stale_order_is_rejected() {
    let mut world = corridor();
    world
        .add(soldier(1, RED, "c"))
        .order(1, &[1], json!({"action": "transit", "path": ["a", "b"]}));

    let report = world.turn();
    assert_eq!(of_type(&report.events, "ORDER_FAILED").len(), 1);
    assert_eq!(world.order_state(1).status, OrderStatus::Failed);
    assert!(world.unit(1).is_in(&"c".into()));
}

#[test]
fn replayed_events_are_not_logged_twice() {
    let mut world = corridor();
    world
        .war()
        .add(soldier(1, RED, "a"))
        .add(soldier(2, BLUE, "c"))
        .order(1, &[1], json!({"action": "transit", "path": ["a", "b"]}))
        .order(2, &[2], json!({"action": "transit", "path": ["c", "b"]}));

    let report = world.turn();
    let logged = world.store.events(GUILD).unwrap().len();
    assert_eq!(report.appended, logged);
    assert!(logged > 0);

    let appended = world.store.append_events(GUILD, &report.events).unwrap();
    assert_eq!(appended, 0);
    assert_eq!(world.store.events(GUILD).unwrap().len(), logged);
}

#[test]
fn turn_counter_advances_once_per_resolution() {
    let mut world = corridor();
    assert_eq!(world.turn().turn, 1);
    assert_eq!(world.turn().turn, 2);
    let status = world.engine.turn_status(&world.store, GUILD).unwrap();
    assert_eq!(status.current_turn, 2);
    assert_eq!(status.total_pending, 0);
}
