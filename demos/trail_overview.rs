//! Basic example of building a trail overview from an in-memory track.
//!
//! Run with: cargo run --example trail_overview

use trail_sections::{
    group_by_year, parse_definitions, GeoPoint, PipelineConfig, PixelPoint, TrailMap, ViewContext,
    ViewEvent,
};

const DEFINITIONS: &str = r#"[
  { "name": "East Devon", "sections": [
    { "start": "Exmouth", "end": "Budleigh Salterton", "startCoords": [50.6196, -3.4137], "endCoords": [50.6286, -3.3206],
      "charlie": true, "olly": true, "dad": true, "date": "2021-05-29" },
    { "start": "Sidmouth", "end": "Budleigh Salterton", "startCoords": [50.6787, -3.2376], "endCoords": [50.6286, -3.3206],
      "dad": true, "date": "2021-05-30" }
  ]},
  { "name": "Jurassic Coast", "sections": [
    { "start": "Sidmouth", "end": "Seaton", "startCoords": [50.6787, -3.2376], "endCoords": [50.7053, -3.0719],
      "charlie": true, "dad": true, "date": "2023-07-14", "videoLink": "https://example.org/seaton" }
  ]}
]"#;

fn main() {
    // Exmouth to Seaton along a few coastal waypoints
    let waypoints = [
        GeoPoint::new(50.6196, -3.4137), // Exmouth
        GeoPoint::new(50.6286, -3.3206), // Budleigh Salterton
        GeoPoint::new(50.6512, -3.2870),
        GeoPoint::new(50.6787, -3.2376), // Sidmouth
        GeoPoint::new(50.6901, -3.1750),
        GeoPoint::new(50.7053, -3.0719), // Seaton
    ];

    // Densify so decimation and simplification have something to do
    let mut raw = Vec::new();
    for pair in waypoints.windows(2) {
        for i in 0..200 {
            let t = i as f64 / 200.0;
            raw.push(GeoPoint::new(
                pair[0].latitude + t * (pair[1].latitude - pair[0].latitude),
                pair[0].longitude + t * (pair[1].longitude - pair[0].longitude),
            ));
        }
    }
    raw.push(waypoints[waypoints.len() - 1]);

    let config = PipelineConfig::default();
    let trips = match parse_definitions(DEFINITIONS, &config.participants) {
        Ok(trips) => trips,
        Err(e) => {
            eprintln!("Bad section definitions: {}", e);
            return;
        }
    };

    let view = ViewContext::new(9.0, PixelPoint::new(0.0, 0.0));
    let mut map = match TrailMap::from_track(&raw, &trips, config, &view) {
        Ok(map) => map,
        Err(e) => {
            eprintln!("Failed to build trail: {}", e);
            return;
        }
    };

    println!("Trail Overview\n");
    println!(
        "Route: {} raw points -> {} vertices, {:.1} mi\n",
        raw.len(),
        map.route().len(),
        map.route().length_miles()
    );

    for group in group_by_year(map.sections()) {
        match group.year {
            Some(year) => println!("{}", year),
            None => println!("Undated"),
        }
        for trip in &group.trips {
            println!("  {}", if trip.name.is_empty() { "(untitled)" } else { trip.name.as_str() });
            for id in &trip.section_ids {
                if let Some(section) = map.sections().get(id) {
                    println!(
                        "    {:<40} {:>5.1} mi  {} traces{}",
                        section.id(),
                        section.miles(),
                        section.traces.len(),
                        if section.request.has_video() { "  [video]" } else { "" }
                    );
                }
            }
        }
    }

    // Zooming in: three events, one recomputation
    map.on_view_event(ViewEvent::ZoomStart(view));
    map.on_view_event(ViewEvent::Zoom(ViewContext::new(11.0, PixelPoint::new(0.0, 0.0))));
    map.on_view_event(ViewEvent::ZoomEnd(ViewContext::new(13.0, PixelPoint::new(0.0, 0.0))));
    if let Some(used) = map.on_frame() {
        println!("\nRefreshed offsets at zoom {} ({} pass)", used.zoom, map.refresh_passes());
    }

    let stats = map.stats();
    println!("\nStats:");
    for participant in &stats.participants {
        println!(
            "  {:<8} {:>5.1} mi  {:>2} sections  {:>5.1}%",
            participant.name, participant.miles, participant.sections, participant.percent
        );
    }

    if let Some(bounds) = map.overview_bounds() {
        let center = bounds.center();
        println!("\nOverview centered at ({:.4}, {:.4})", center.latitude, center.longitude);
    }
}
