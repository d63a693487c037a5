use rustrict::CensorStr;

#[derive(Debug)]
pub struct ProfanityFilter;

impl ProfanityFilter {
    pub fn contains_profanity(text: &str) -> bool {
        text.is_inappropriate()
    }

    pub fn validate_player_name(name: &str) -> Result<(), String> {
        if Self::contains_profanity(name) {
            return Err(format!("Inappropriate language detected: {}", name.censor()));
        }
        Ok(())
    }
}
