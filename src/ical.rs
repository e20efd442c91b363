use std::collections::HashMap;

use chrono::Duration;
use chrono_tz::Tz;
use icalendar::{Calendar, CalendarDateTime, Component, Event, EventLike};

use crate::model::TeamId;
use crate::model::game::Match;
use crate::model::team::Team;

/// Build an iCalendar feed with every scheduled match `team` plays or referees.
/// Unscheduled matches are left out.
pub fn team_calendar(team: &Team, matches: &[Match], names: &HashMap<TeamId, String>, tz: Tz) -> String {
    let name_of = |id: TeamId| names.get(&id).map(|s| s.as_str()).unwrap_or("Unknown Team");

    let mut calendar = Calendar::new();
    calendar.name(&format!("{} ({})", team.name, team.category));

    let mut games: Vec<&Match> = matches
        .iter()
        .filter(|m| m.involves(team.id) && m.match_time.is_some())
        .collect();
    games.sort_by_key(|m| (m.match_time, m.id));

    for game in games {
        let Some(start) = game.match_time else { continue };
        let summary = format!("{} vs {}", name_of(game.team1_id), name_of(game.team2_id));
        let description = if game.referee_id == team.id {
            "Referee duty".to_string()
        } else {
            format!("Referee: {}", name_of(game.referee_id))
        };
        let starts = CalendarDateTime::WithTimezone { date_time: start, tzid: tz.name().to_string() };
        let ends = CalendarDateTime::WithTimezone {
            date_time: start + Duration::hours(1),
            tzid: tz.name().to_string(),
        };

        calendar.push(
            Event::new()
                .uid(&format!("match-{}-team-{}", game.id, team.id))
                .summary(&summary)
                .description(&description)
                .starts(starts)
                .ends(ends)
                .done(),
        );
    }

    calendar.done().to_string()
}
