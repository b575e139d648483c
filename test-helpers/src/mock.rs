//! Realistic event data for tests.

use jiff::{Span, Timestamp};
use payloads::{EventId, UserId, responses::Event};
use uuid::Uuid;

const TITLES: [&str; 5] = [
    "Rust Meetup",
    "Atelier cuisine",
    "Course du dimanche",
    "Soirée jeux de société",
    "Conférence climat",
];

const LOCATIONS: [&str; 4] = ["Paris", "Lyon", "Bordeaux", "Lille"];

/// `count` events organized by `organizer_id`, one per day starting at
/// `first_start`.
pub fn events(
    organizer_id: UserId,
    count: usize,
    first_start: Timestamp,
) -> Vec<Event> {
    (0..count)
        .map(|i| Event {
            id: EventId(Uuid::new_v4()),
            title: format!("{} #{}", TITLES[i % TITLES.len()], i + 1),
            description: (i % 3 == 0)
                .then(|| "Ouvert à tous, inscription gratuite.".to_string()),
            location: Some(LOCATIONS[i % LOCATIONS.len()].to_string()),
            starts_at: first_start + Span::new().hours(24 * i as i64),
            organizer_id,
            capacity: (i % 2 == 0).then_some(20 + i as u32),
        })
        .collect()
}
