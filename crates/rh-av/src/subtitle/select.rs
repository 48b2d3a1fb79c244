use super::SubtitleTrack;

/// Pick the track a viewer most likely wants: the first English track by
/// language tag or title, else the first track.
pub fn select_preferred(tracks: &[SubtitleTrack]) -> Option<&SubtitleTrack> {
    tracks.iter().find(|t| is_english(t)).or_else(|| tracks.first())
}

fn is_english(track: &SubtitleTrack) -> bool {
    let lang = track.language.trim();
    lang.eq_ignore_ascii_case("eng")
        || lang.eq_ignore_ascii_case("en")
        || track
            .title
            .as_deref()
            .is_some_and(|t| t.to_lowercase().contains("english"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_wins_regardless_of_order() {
        let tracks = vec![SubtitleTrack::new(2, "fre"), SubtitleTrack::new(3, "eng")];
        assert_eq!(select_preferred(&tracks).map(|t| t.index), Some(3));

        let tracks = vec![SubtitleTrack::new(3, "ENG"), SubtitleTrack::new(2, "fre")];
        assert_eq!(select_preferred(&tracks).map(|t| t.index), Some(3));
    }

    #[test]
    fn title_mentioning_english_counts() {
        let tracks = vec![
            SubtitleTrack::new(4, "und"),
            SubtitleTrack::new(5, "und").with_title("English (SDH)"),
        ];
        assert_eq!(select_preferred(&tracks).map(|t| t.index), Some(5));
    }

    #[test]
    fn two_letter_code_counts() {
        let tracks = vec![SubtitleTrack::new(2, "de"), SubtitleTrack::new(7, "en")];
        assert_eq!(select_preferred(&tracks).map(|t| t.index), Some(7));
    }

    #[test]
    fn falls_back_to_first_track() {
        let tracks = vec![SubtitleTrack::new(6, "spa"), SubtitleTrack::new(7, "ger")];
        assert_eq!(select_preferred(&tracks).map(|t| t.index), Some(6));
    }

    #[test]
    fn empty_list_selects_nothing() {
        assert!(select_preferred(&[]).is_none());
    }
}
