//! Rules specific to the healer class: charges, drops and lost advantages.

use crate::event::{ChargeType, MatchEvent, Team};

use super::{aggregator::ApplyOutcome, errors::MatchError, handlers::required_meta, Match};

/// Charge deployed by the source player. Logs that predate charge types
/// omit `medigun`; those count as a regular uber.
pub(super) fn charge_deployed(
    game: &mut Match,
    event: &MatchEvent,
) -> Result<ApplyOutcome, MatchError> {
    let Some(source) = event.source else {
        return Ok(ApplyOutcome::Skipped);
    };
    let charge = match event.meta("medigun") {
        Some(_) => required_meta::<ChargeType>(event, "medigun")?,
        None => ChargeType::Uber,
    };

    game.healer_for(&source, event.created_on).record_charge(charge);
    if let Some(team) = game.team_for(source.team) {
        team.charges += 1;
    }
    if let Some(round) = game.current_round() {
        round.charges.add(source.team, 1);
    }
    Ok(ApplyOutcome::Applied)
}

pub(super) fn charge_ended(
    game: &mut Match,
    event: &MatchEvent,
) -> Result<ApplyOutcome, MatchError> {
    let Some(source) = event.source else {
        return Ok(ApplyOutcome::Skipped);
    };
    let duration: f64 = required_meta(event, "duration")?;
    game.healer_for(&source, event.created_on)
        .charge_durations
        .push(duration);
    Ok(ApplyOutcome::Applied)
}

/// The healer is the target. A death holding a full charge is a drop,
/// credited to the team opposite the one declared on the event.
pub(super) fn medic_death(
    game: &mut Match,
    event: &MatchEvent,
) -> Result<ApplyOutcome, MatchError> {
    let Some(medic) = event.target else {
        return Ok(ApplyOutcome::Skipped);
    };
    if !event.meta_flag("ubercharge") {
        return Ok(ApplyOutcome::Applied);
    }

    game.healer_for(&medic, event.created_on).drops += 1;
    let declared = event.source.map(|s| s.team).unwrap_or(Team::Unassigned);
    if let Some(team) = game.team_for(declared.opponent()) {
        team.drops += 1;
    }
    Ok(ApplyOutcome::Applied)
}

pub(super) fn medic_death_ex(
    game: &mut Match,
    event: &MatchEvent,
) -> Result<ApplyOutcome, MatchError> {
    let Some(medic) = event.source else {
        return Ok(ApplyOutcome::Skipped);
    };
    let pct: i32 = required_meta(event, "uberpct")?;
    game.healer_for(&medic, event.created_on)
        .record_death_charge(pct);
    Ok(ApplyOutcome::Applied)
}

pub(super) fn lost_uber_advantage(
    game: &mut Match,
    event: &MatchEvent,
) -> Result<ApplyOutcome, MatchError> {
    let Some(medic) = event.source else {
        return Ok(ApplyOutcome::Skipped);
    };
    let secs: i32 = required_meta(event, "time")?;
    game.healer_for(&medic, event.created_on)
        .record_advantage_lost(secs);
    Ok(ApplyOutcome::Applied)
}

pub(super) fn first_heal_after_spawn(
    game: &mut Match,
    event: &MatchEvent,
) -> Result<ApplyOutcome, MatchError> {
    let Some(medic) = event.source else {
        return Ok(ApplyOutcome::Skipped);
    };
    let secs: f64 = required_meta(event, "time")?;
    game.healer_for(&medic, event.created_on).first_heals.push(secs);
    Ok(ApplyOutcome::Applied)
}
