use std::collections::HashMap;
use std::str::FromStr;
use std::sync::OnceLock;

use tracing::debug;

use crate::event::{CustomKill, EventKind, MatchEvent, PickupItem, PlayerClass, PlayerRef, Team};

use super::{aggregator::ApplyOutcome, errors::MatchError, healer, Match};

/// One rule: mutates the aggregates for a single gameplay event kind
pub(super) type Handler = fn(&mut Match, &MatchEvent) -> Result<ApplyOutcome, MatchError>;

static HANDLERS: OnceLock<HashMap<EventKind, Handler>> = OnceLock::new();

fn table() -> HashMap<EventKind, Handler> {
    let mut handlers: HashMap<EventKind, Handler> = HashMap::new();
    handlers.insert(EventKind::Kill, kill);
    handlers.insert(EventKind::CustomKill, custom_kill);
    handlers.insert(EventKind::KillAssist, kill_assist);
    handlers.insert(EventKind::Suicide, suicide);
    handlers.insert(EventKind::Damage, damage);
    handlers.insert(EventKind::Heal, heal);
    handlers.insert(EventKind::Domination, domination);
    handlers.insert(EventKind::Revenge, revenge);
    handlers.insert(EventKind::Pickup, pickup);
    handlers.insert(EventKind::ChangeClass, change_class);
    handlers.insert(EventKind::SpawnedAs, change_class);
    handlers.insert(EventKind::ShotFired, shot_fired);
    handlers.insert(EventKind::ShotHit, shot_hit);
    handlers.insert(EventKind::Extinguish, extinguish);
    handlers.insert(EventKind::BuiltObject, built_object);
    handlers.insert(EventKind::KilledObject, killed_object);
    handlers.insert(EventKind::CarryObject, carried_object);
    handlers.insert(EventKind::DropObject, dropped_object);
    handlers.insert(EventKind::DetonatedObject, detonated_object);
    handlers.insert(EventKind::PointCaptured, point_captured);
    handlers.insert(EventKind::CaptureBlocked, capture_blocked);
    handlers.insert(EventKind::ChargeDeployed, healer::charge_deployed);
    handlers.insert(EventKind::ChargeEnded, healer::charge_ended);
    handlers.insert(EventKind::MedicDeath, healer::medic_death);
    handlers.insert(EventKind::MedicDeathEx, healer::medic_death_ex);
    handlers.insert(EventKind::LostUberAdv, healer::lost_uber_advantage);
    handlers.insert(EventKind::FirstHealAfterSpawn, healer::first_heal_after_spawn);
    handlers
}

pub(super) fn handler_for(kind: EventKind) -> Option<Handler> {
    HANDLERS.get_or_init(table).get(&kind).copied()
}

/// Parses a metadata field the rule cannot do without
pub(super) fn required_meta<T: FromStr>(
    event: &MatchEvent,
    key: &'static str,
) -> Result<T, MatchError> {
    let raw = event.meta(key).ok_or(MatchError::MissingMetadata {
        kind: event.kind,
        key,
    })?;
    raw.trim().parse().map_err(|_| MatchError::InvalidMetadata {
        kind: event.kind,
        key,
        value: raw.to_string(),
    })
}

fn source_of(event: &MatchEvent) -> Option<PlayerRef> {
    event.source
}

fn both_of(event: &MatchEvent) -> Option<(PlayerRef, PlayerRef)> {
    Some((event.source?, event.target?))
}

fn kill(game: &mut Match, event: &MatchEvent) -> Result<ApplyOutcome, MatchError> {
    let Some((source, target)) = both_of(event) else {
        return Ok(ApplyOutcome::Skipped);
    };
    credit_kill(game, event, source, target);
    Ok(ApplyOutcome::Applied)
}

/// Kill and death credit shared by plain and finishing-move kills.
/// Team credit follows the team carried on the event.
fn credit_kill(game: &mut Match, event: &MatchEvent, source: PlayerRef, target: PlayerRef) {
    let at = event.created_on;
    let min_streak = game.options.min_killstreak;

    let killer = game.player_for(&source, at);
    killer.kills += 1;
    if let Some(class) = killer.on_class() {
        class.kills += 1;
    }
    if let Some(weapon) = killer.weapon(event.weapon.as_deref()) {
        weapon.kills += 1;
    }
    killer.extend_streak(at, min_streak);

    let victim = game.player_for(&target, at);
    victim.deaths += 1;
    if let Some(class) = victim.on_class() {
        class.deaths += 1;
    }
    victim.end_streak(min_streak);

    if let Some(team) = game.team_for(source.team) {
        team.kills += 1;
    }
    if let Some(round) = game.current_round() {
        round.kills.add(source.team, 1);
    }
}

fn custom_kill(game: &mut Match, event: &MatchEvent) -> Result<ApplyOutcome, MatchError> {
    let Some((source, target)) = both_of(event) else {
        return Ok(ApplyOutcome::Skipped);
    };
    let raw = event.meta("customkill").ok_or(MatchError::MissingMetadata {
        kind: event.kind,
        key: "customkill",
    })?;

    let at = event.created_on;
    match raw.parse::<CustomKill>() {
        // a faked death, not an elimination
        Ok(CustomKill::FeignDeath) => return Ok(ApplyOutcome::Applied),
        Ok(kind) => {
            let killer = game.player_for(&source, at);
            let weapon_key = event.weapon.as_deref();
            match kind {
                CustomKill::Backstab => {
                    killer.backstabs += 1;
                    if let Some(weapon) = killer.weapon(weapon_key) {
                        weapon.backstabs += 1;
                    }
                }
                CustomKill::Headshot => {
                    killer.headshots += 1;
                    if let Some(weapon) = killer.weapon(weapon_key) {
                        weapon.headshots += 1;
                    }
                }
                CustomKill::Airshot => {
                    killer.airshots += 1;
                    if let Some(weapon) = killer.weapon(weapon_key) {
                        weapon.airshots += 1;
                    }
                }
                CustomKill::FeignDeath => {}
            }
        }
        Err(_) => {
            debug!(custom_kill = raw, "Unknown custom kill type, crediting plain kill");
        }
    }

    credit_kill(game, event, source, target);
    Ok(ApplyOutcome::Applied)
}

fn kill_assist(game: &mut Match, event: &MatchEvent) -> Result<ApplyOutcome, MatchError> {
    let Some(source) = source_of(event) else {
        return Ok(ApplyOutcome::Skipped);
    };
    let player = game.player_for(&source, event.created_on);
    player.assists += 1;
    if let Some(class) = player.on_class() {
        class.assists += 1;
    }
    Ok(ApplyOutcome::Applied)
}

fn suicide(game: &mut Match, event: &MatchEvent) -> Result<ApplyOutcome, MatchError> {
    let Some(source) = source_of(event) else {
        return Ok(ApplyOutcome::Skipped);
    };
    let min_streak = game.options.min_killstreak;
    let player = game.player_for(&source, event.created_on);
    player.suicides += 1;
    player.end_streak(min_streak);
    Ok(ApplyOutcome::Applied)
}

fn damage(game: &mut Match, event: &MatchEvent) -> Result<ApplyOutcome, MatchError> {
    let Some(source) = source_of(event) else {
        return Ok(ApplyOutcome::Skipped);
    };
    let at = event.created_on;
    let amount = if game.options.use_real_damage {
        event.real_damage
    } else {
        event.damage
    };
    let airshot = event.meta_flag("airshot");

    let attacker = game.player_for(&source, at);
    attacker.damage += amount;
    if airshot {
        attacker.airshots += 1;
    }
    if let Some(class) = attacker.on_class() {
        class.damage += amount;
    }
    if let Some(weapon) = attacker.weapon(event.weapon.as_deref()) {
        weapon.damage += amount;
        if airshot {
            weapon.airshots += 1;
        }
    }

    if let Some(target) = event.target {
        let victim = game.player_for(&target, at);
        victim.damage_taken += amount;
        if let Some(class) = victim.on_class() {
            class.damage_taken += amount;
        }
    }

    if let Some(team) = game.team_for(source.team) {
        team.damage += amount;
    }
    if let Some(round) = game.current_round() {
        round.damage.add(source.team, amount);
    }
    Ok(ApplyOutcome::Applied)
}

fn heal(game: &mut Match, event: &MatchEvent) -> Result<ApplyOutcome, MatchError> {
    let Some((source, target)) = both_of(event) else {
        return Ok(ApplyOutcome::Skipped);
    };
    let at = event.created_on;
    let amount = event.healing;

    game.player_for(&source, at).healing += amount;
    if let Some(healer) = game.healers.get_mut(&source.id) {
        healer.healing += amount;
    }

    let patient = game.player_for(&target, at);
    patient.healing_taken += amount;
    if let Some(class) = patient.on_class() {
        class.healing_taken += amount;
    }
    Ok(ApplyOutcome::Applied)
}

fn domination(game: &mut Match, event: &MatchEvent) -> Result<ApplyOutcome, MatchError> {
    let Some((source, target)) = both_of(event) else {
        return Ok(ApplyOutcome::Skipped);
    };
    let at = event.created_on;

    let player = game.player_for(&source, at);
    player.dominations += 1;
    if let Some(class) = player.on_class() {
        class.dominations += 1;
    }

    let victim = game.player_for(&target, at);
    victim.dominated += 1;
    if let Some(class) = victim.on_class() {
        class.dominated += 1;
    }
    Ok(ApplyOutcome::Applied)
}

fn revenge(game: &mut Match, event: &MatchEvent) -> Result<ApplyOutcome, MatchError> {
    let Some(source) = source_of(event) else {
        return Ok(ApplyOutcome::Skipped);
    };
    let player = game.player_for(&source, event.created_on);
    player.revenges += 1;
    if let Some(class) = player.on_class() {
        class.revenges += 1;
    }
    Ok(ApplyOutcome::Applied)
}

fn pickup(game: &mut Match, event: &MatchEvent) -> Result<ApplyOutcome, MatchError> {
    let Some(source) = source_of(event) else {
        return Ok(ApplyOutcome::Skipped);
    };
    let raw = event.meta("item").ok_or(MatchError::MissingMetadata {
        kind: event.kind,
        key: "item",
    })?;

    match raw.parse::<PickupItem>() {
        Ok(item) if item.is_health_pack() => {
            let player = game.player_for(&source, event.created_on);
            player.health_packs += 1;
            player.healing += event.healing;
        }
        Ok(_) => {}
        Err(_) => debug!(item = raw, "Ignoring unknown pickup item"),
    }
    Ok(ApplyOutcome::Applied)
}

fn change_class(game: &mut Match, event: &MatchEvent) -> Result<ApplyOutcome, MatchError> {
    let Some(source) = source_of(event) else {
        return Ok(ApplyOutcome::Skipped);
    };
    let class: PlayerClass = required_meta(event, "class")?;
    if class == PlayerClass::Spectator {
        return Ok(ApplyOutcome::Applied);
    }
    game.assign_class(&source, class, event.created_on);
    Ok(ApplyOutcome::Applied)
}

fn shot_fired(game: &mut Match, event: &MatchEvent) -> Result<ApplyOutcome, MatchError> {
    let Some(source) = source_of(event) else {
        return Ok(ApplyOutcome::Skipped);
    };
    let player = game.player_for(&source, event.created_on);
    player.shots += 1;
    if let Some(weapon) = player.weapon(event.weapon.as_deref()) {
        weapon.shots += 1;
    }
    Ok(ApplyOutcome::Applied)
}

fn shot_hit(game: &mut Match, event: &MatchEvent) -> Result<ApplyOutcome, MatchError> {
    let Some(source) = source_of(event) else {
        return Ok(ApplyOutcome::Skipped);
    };
    let player = game.player_for(&source, event.created_on);
    player.hits += 1;
    if let Some(weapon) = player.weapon(event.weapon.as_deref()) {
        weapon.hits += 1;
    }
    Ok(ApplyOutcome::Applied)
}

fn extinguish(game: &mut Match, event: &MatchEvent) -> Result<ApplyOutcome, MatchError> {
    let Some(source) = source_of(event) else {
        return Ok(ApplyOutcome::Skipped);
    };
    game.player_for(&source, event.created_on).extinguishes += 1;
    Ok(ApplyOutcome::Applied)
}

fn built_object(game: &mut Match, event: &MatchEvent) -> Result<ApplyOutcome, MatchError> {
    let Some(source) = source_of(event) else {
        return Ok(ApplyOutcome::Skipped);
    };
    game.player_for(&source, event.created_on).structures_built += 1;
    Ok(ApplyOutcome::Applied)
}

fn killed_object(game: &mut Match, event: &MatchEvent) -> Result<ApplyOutcome, MatchError> {
    let Some(source) = source_of(event) else {
        return Ok(ApplyOutcome::Skipped);
    };
    let player = game.player_for(&source, event.created_on);
    player.structures_destroyed += 1;
    if let Some(class) = player.on_class() {
        class.structures_destroyed += 1;
    }
    Ok(ApplyOutcome::Applied)
}

fn carried_object(game: &mut Match, event: &MatchEvent) -> Result<ApplyOutcome, MatchError> {
    let Some(source) = source_of(event) else {
        return Ok(ApplyOutcome::Skipped);
    };
    game.player_for(&source, event.created_on).structures_carried += 1;
    Ok(ApplyOutcome::Applied)
}

fn dropped_object(game: &mut Match, event: &MatchEvent) -> Result<ApplyOutcome, MatchError> {
    let Some(source) = source_of(event) else {
        return Ok(ApplyOutcome::Skipped);
    };
    game.player_for(&source, event.created_on).structures_dropped += 1;
    Ok(ApplyOutcome::Applied)
}

fn detonated_object(game: &mut Match, event: &MatchEvent) -> Result<ApplyOutcome, MatchError> {
    let Some(source) = source_of(event) else {
        return Ok(ApplyOutcome::Skipped);
    };
    game.player_for(&source, event.created_on).structures_detonated += 1;
    Ok(ApplyOutcome::Applied)
}

/// One event per capture. The capturing team comes from the `team` field
/// when present, otherwise from the capturing player.
fn point_captured(game: &mut Match, event: &MatchEvent) -> Result<ApplyOutcome, MatchError> {
    let team = match event.meta("team") {
        Some(_) => required_meta::<Team>(event, "team")?,
        None => match event.source {
            Some(source) => source.team,
            None => {
                return Err(MatchError::MissingMetadata {
                    kind: event.kind,
                    key: "team",
                })
            }
        },
    };

    if let Some(source) = event.source {
        let player = game.player_for(&source, event.created_on);
        player.captures += 1;
        if let Some(class) = player.on_class() {
            class.captures += 1;
        }
    }

    let first_of_round = match game.current_round() {
        Some(round) if round.mid_fight.is_none() && team.is_playable() => {
            round.mid_fight = Some(team);
            true
        }
        _ => false,
    };

    if let Some(aggregate) = game.team_for(team) {
        aggregate.captures += 1;
        if first_of_round {
            aggregate.mid_fights += 1;
        }
    }
    Ok(ApplyOutcome::Applied)
}

fn capture_blocked(game: &mut Match, event: &MatchEvent) -> Result<ApplyOutcome, MatchError> {
    let Some(source) = source_of(event) else {
        return Ok(ApplyOutcome::Skipped);
    };
    let player = game.player_for(&source, event.created_on);
    player.captures_blocked += 1;
    if let Some(class) = player.on_class() {
        class.captures_blocked += 1;
    }
    Ok(ApplyOutcome::Applied)
}
