use super::domain::{Track, TrackIcon, TrackId};

const DEFAULT_TRACK: &str = "ai";

/// The immersion tracks offered for the school year, in presentation order.
#[derive(Debug, Clone)]
pub struct TrackCatalog {
    tracks: Vec<Track>,
}

impl TrackCatalog {
    pub fn standard() -> Self {
        Self {
            tracks: vec![
                track(
                    "ai",
                    "Understanding Artificial Intelligence",
                    "Deep dive into machine learning models and future tech automation.",
                    TrackIcon::Brain,
                    120,
                ),
                track(
                    "game-design",
                    "Game Design",
                    "Crafting immersive experiences through mechanics and visual storytelling.",
                    TrackIcon::Gamepad,
                    80,
                ),
                track(
                    "psychology",
                    "Mind Talks: Psychology & Life",
                    "Exploring human behavior, mental health, and social dynamics.",
                    TrackIcon::Users,
                    100,
                ),
                track(
                    "film-photo",
                    "Film and Photography",
                    "Visual narrative techniques and professional cinematography basics.",
                    TrackIcon::Camera,
                    120,
                ),
                track(
                    "pneumatics",
                    "PNEUMATICS: Fluid Power",
                    "Industrial automation using compressed air and control systems.",
                    TrackIcon::Wind,
                    90,
                ),
                track(
                    "data-viz",
                    "Business Data Visualization",
                    "Transforming complex data into actionable business insights.",
                    TrackIcon::BarChart,
                    110,
                ),
                track(
                    "tourism",
                    "Beyond the Postcard",
                    "Sustainable tourism and cultural management in a global market.",
                    TrackIcon::Map,
                    120,
                ),
                track(
                    "hydraulics",
                    "Hydraulics: Water at Works",
                    "Engineering principles of liquid-based mechanical power.",
                    TrackIcon::Droplets,
                    100,
                ),
                track(
                    "electrical",
                    "Smart Electrical Lighting",
                    "Modern circuitry and IoT integration for energy-efficient systems.",
                    TrackIcon::Lightbulb,
                    120,
                ),
            ],
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, id: &TrackId) -> Option<&Track> {
        self.tracks.iter().find(|track| &track.id == id)
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.get(id).is_some()
    }

    /// The track preselected on a fresh draft.
    pub fn default_track_id(&self) -> TrackId {
        TrackId::new(DEFAULT_TRACK)
    }
}

fn track(id: &str, title: &str, description: &str, icon: TrackIcon, hours: u32) -> Track {
    Track {
        id: TrackId::new(id),
        title: title.to_string(),
        description: description.to_string(),
        icon,
        hours,
    }
}
