use uuid::Uuid;

/// Fresh identifier for frames, layers, track items and keyframes.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
