#![allow(dead_code)]

/// Builder for bodies shaped like the server's `user/activity_embed.html`.
#[derive(Debug, Clone)]
pub struct ActivityMarkup {
    pub status: Option<String>,
    pub title: String,
    pub artists: String,
    pub album: Option<String>,
    pub lyrics: bool,
}

impl ActivityMarkup {
    pub fn new(status: &str, title: &str, artists: &str) -> Self {
        Self {
            status: Some(status.to_string()),
            title: title.to_string(),
            artists: artists.to_string(),
            album: None,
            lyrics: false,
        }
    }

    pub fn with_album(mut self, album: &str) -> Self {
        self.album = Some(album.to_string());
        self
    }

    pub fn with_lyrics(mut self) -> Self {
        self.lyrics = true;
        self
    }

    pub fn without_header(mut self) -> Self {
        self.status = None;
        self
    }

    /// Full response body: the anchor element wrapped in page chrome.
    pub fn body(&self) -> String {
        format!(
            "<section class=\"embed\">\n{}\n<footer>powered by yutify</footer>\n</section>",
            self.anchor()
        )
    }

    pub fn anchor(&self) -> String {
        let header = self
            .status
            .as_ref()
            .map(|s| {
                format!(
                    "  <div class=\"user-activity-header\"><h4>\n    {}\n  </h4></div>\n",
                    s
                )
            })
            .unwrap_or_default();
        let album = self
            .album
            .as_ref()
            .map(|a| format!("  <div class=\"music-info\"><span class=\"ellipsis\">{}</span></div>\n", a))
            .unwrap_or_default();
        let lyrics = if self.lyrics {
            "  <button id=\"show-lyrics\">Lyrics</button>\n  <dialog id=\"lyrics\"><button id=\"close-lyrics\">x</button></dialog>\n"
        } else {
            ""
        };
        format!(
            "<article id=\"user-activity\" class=\"user-activity-container\">\n{header}  <div class=\"music-info\"><span class=\"ellipsis\"> {} </span></div>\n  <div class=\"music-info\"><span class=\"ellipsis\">{}</span></div>\n{album}{lyrics}</article>",
            self.title, self.artists
        )
    }
}
