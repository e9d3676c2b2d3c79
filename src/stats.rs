//! Mileage summaries for the sidebar.
//!
//! Pure aggregation over a built [`SectionSet`]; no geometry is recomputed.
//! Section lengths come from their sliced paths and the trail total from the
//! reference route's cached length.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::sections::{SectionSet, Trip};
use crate::simplify::ReferenceRoute;
use crate::Participant;

/// Progress of one walker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantStats {
    pub name: String,
    pub miles: f64,
    pub sections: u32,
    /// Share of the whole trail walked, capped at 100
    pub percent: f64,
}

/// Totals across every rendered section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrailStats {
    pub route_miles: f64,
    pub overall_miles: f64,
    pub overall_sections: u32,
    pub participants: Vec<ParticipantStats>,
}

/// Sum miles and section counts per participant, in roster order.
pub fn compute_stats(sections: &SectionSet, route: &ReferenceRoute, roster: &[Participant]) -> TrailStats {
    let route_miles = route.length_miles();

    let mut overall_miles = 0.0;
    let mut overall_sections = 0;
    let mut per: Vec<(f64, u32)> = vec![(0.0, 0); roster.len()];

    for section in sections.iter() {
        let miles = section.miles();
        overall_miles += miles;
        overall_sections += 1;
        for (i, participant) in roster.iter().enumerate() {
            if section.request.walked_by(&participant.name) {
                per[i].0 += miles;
                per[i].1 += 1;
            }
        }
    }

    let participants = roster
        .iter()
        .zip(per)
        .map(|(participant, (miles, count))| ParticipantStats {
            name: participant.name.clone(),
            miles,
            sections: count,
            percent: if route_miles > 0.0 {
                (miles / route_miles * 100.0).min(100.0)
            } else {
                0.0
            },
        })
        .collect();

    TrailStats { route_miles, overall_miles, overall_sections, participants }
}

/// Trips that share a year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearGroup {
    /// `None` collects trips with no dated section
    pub year: Option<i32>,
    pub trips: Vec<Trip>,
}

/// Group trips by year, newest first, undated trips last.
///
/// This is the order the sidebar lists them in, top to bottom: render the
/// groups as returned, without reversing. Trips keep their definition order
/// within a group.
pub fn group_by_year(sections: &SectionSet) -> Vec<YearGroup> {
    let mut by_year: BTreeMap<i32, Vec<Trip>> = BTreeMap::new();
    let mut undated: Vec<Trip> = Vec::new();

    for trip in &sections.trips {
        match trip.year {
            Some(year) => by_year.entry(year).or_default().push(trip.clone()),
            None => undated.push(trip.clone()),
        }
    }

    let mut groups: Vec<YearGroup> = by_year
        .into_iter()
        .rev()
        .map(|(year, trips)| YearGroup { year: Some(year), trips })
        .collect();
    if !undated.is_empty() {
        groups.push(YearGroup { year: None, trips: undated });
    }
    groups
}
