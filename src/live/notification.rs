use super::{LiveMember, LiveStream};

/// Twitch purple
pub const LIVE_COLOUR: u32 = 0x6441A4;

const THUMBNAIL_WIDTH: &str = "400";
const THUMBNAIL_HEIGHT: &str = "225";

/// Go-live announcement, independent of how the chat platform renders it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveNotification {
    pub colour: u32,
    pub author_name: String,
    pub author_icon_url: String,
    pub url: String,
    pub fields: Vec<NotificationField>,
    pub image_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl NotificationField {
    fn new(name: &str, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.to_owned(),
            value: value.into(),
            inline,
        }
    }
}

pub fn profile_url(login: &str) -> String {
    format!("https://twitch.tv/{}", login)
}

impl LiveNotification {
    /// `stream` is None when the pass knows the member is live but has no stream details.
    pub fn compose(member: &LiveMember, login: &str, stream: Option<&LiveStream>) -> Self {
        let url = profile_url(login);

        let mut fields = Vec::new();
        let mut image_url = None;
        match stream {
            Some(stream) => {
                let title = if stream.title.trim().is_empty() {
                    "Untitled stream"
                } else {
                    stream.title.as_str()
                };
                let category = if stream.category.trim().is_empty() {
                    "Not specified"
                } else {
                    stream.category.as_str()
                };
                fields.push(NotificationField::new("Stream Title", title, false));
                fields.push(NotificationField::new("Game/Category", category, true));
                if let Some(viewers) = stream.viewer_count {
                    fields.push(NotificationField::new("Viewers", viewers.to_string(), true));
                }
                image_url = stream
                    .thumbnail_url_template
                    .as_deref()
                    .filter(|template| !template.is_empty())
                    .map(|template| {
                        template
                            .replace("{width}", THUMBNAIL_WIDTH)
                            .replace("{height}", THUMBNAIL_HEIGHT)
                    });
            }
            None => fields.push(NotificationField::new("Go Watch!", url.clone(), false)),
        }

        Self {
            colour: LIVE_COLOUR,
            author_name: format!("{} is now live on Twitch! ✨", member.display_name),
            author_icon_url: member.avatar_url.clone(),
            url,
            fields,
            image_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serenity::all::UserId;

    fn member() -> LiveMember {
        LiveMember {
            id: UserId::new(1),
            display_name: "Alice".to_owned(),
            avatar_url: "https://cdn/alice.png".to_owned(),
            roles: Vec::new(),
        }
    }

    #[test]
    fn full_stream_details() {
        let stream = LiveStream {
            platform_user_id: "11".to_owned(),
            title: "Speedrun".to_owned(),
            category: "Celeste".to_owned(),
            viewer_count: Some(42),
            thumbnail_url_template: Some("https://t/{width}x{height}.jpg".to_owned()),
        };
        let n = LiveNotification::compose(&member(), "alice", Some(&stream));

        assert_eq!(n.author_name, "Alice is now live on Twitch! ✨");
        assert_eq!(n.url, "https://twitch.tv/alice");
        assert_eq!(n.image_url.as_deref(), Some("https://t/400x225.jpg"));
        let names: Vec<_> = n.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["Stream Title", "Game/Category", "Viewers"]);
        assert_eq!(n.fields[2].value, "42");
    }

    #[test]
    fn missing_category_and_viewers() {
        let stream = LiveStream {
            platform_user_id: "11".to_owned(),
            title: "chatting".to_owned(),
            category: String::new(),
            viewer_count: None,
            thumbnail_url_template: Some(String::new()),
        };
        let n = LiveNotification::compose(&member(), "alice", Some(&stream));

        assert_eq!(n.fields.len(), 2);
        assert_eq!(n.fields[1].value, "Not specified");
        assert_eq!(n.image_url, None);
    }

    #[test]
    fn no_stream_details_falls_back_to_go_watch() {
        let n = LiveNotification::compose(&member(), "alice", None);
        assert_eq!(
            n.fields,
            [NotificationField {
                name: "Go Watch!".to_owned(),
                value: "https://twitch.tv/alice".to_owned(),
                inline: false,
            }]
        );
        assert_eq!(n.image_url, None);
    }
}
