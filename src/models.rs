use serde::{Deserialize, Serialize};

/// Suffix appended to the name slug to form a video file name.
pub const VIDEO_FILE_SUFFIX: &str = "-history.mp4";

/// One metadata entry describing a generated video.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub id: String,
    pub celebrity_name: String,
    pub title: String,
    pub description: String,
    pub custom_script: String,
    pub video_url: String,
}

/// The metadata document, `{ "videos": [...] }`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoCatalog {
    #[serde(default)]
    pub videos: Vec<VideoRecord>,
}

impl VideoCatalog {
    pub fn find_by_url(&self, video_url: &str) -> Option<&VideoRecord> {
        self.videos.iter().find(|v| v.video_url == video_url)
    }

    /// Inserts or replaces the record for `request`'s video URL.
    ///
    /// An existing record with the same `video_url` keeps its id and its
    /// position; otherwise a record with `fresh_id` (bumped until unique) is
    /// appended.
    pub fn upsert(
        &mut self,
        request: &ValidatedRequest,
        video_url: &str,
        fresh_id: u64,
    ) -> VideoRecord {
        if let Some(index) = self.videos.iter().position(|v| v.video_url == video_url) {
            let record = request.to_record(self.videos[index].id.clone(), video_url);
            self.videos[index] = record.clone();
            return record;
        }

        let record = request.to_record(self.unique_id(fresh_id), video_url);
        self.videos.push(record.clone());
        record
    }

    /// Replaces the record with the same `video_url`, or appends it.
    pub fn put(&mut self, record: VideoRecord) {
        match self.videos.iter_mut().find(|v| v.video_url == record.video_url) {
            Some(existing) => *existing = record,
            None => self.videos.push(record),
        }
    }

    fn unique_id(&self, mut candidate: u64) -> String {
        while self.videos.iter().any(|v| v.id == candidate.to_string()) {
            candidate += 1;
        }
        candidate.to_string()
    }
}

/// Body of `POST /api/generate-video`. Every field is optional on the wire so
/// that a missing field turns into a 400 with a readable message instead of
/// an extractor rejection.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoRequest {
    pub celebrity_name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub custom_script: Option<String>,
    /// Accepted for compatibility; the URL is always derived from the name.
    pub video_url: Option<String>,
}

/// A generation request with every required field present and non-blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub celebrity_name: String,
    pub title: String,
    pub description: String,
    pub custom_script: String,
    pub file_name: String,
}

impl GenerateVideoRequest {
    /// Checks required fields. The error lists every missing field by its
    /// JSON name.
    pub fn validate(&self) -> Result<ValidatedRequest, String> {
        let fields = [
            ("celebrityName", &self.celebrity_name),
            ("title", &self.title),
            ("description", &self.description),
            ("customScript", &self.custom_script),
        ];
        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(format!("Missing required fields: {}", missing.join(", ")));
        }

        let celebrity_name = field(&self.celebrity_name);
        let file_name = video_file_name(&celebrity_name).ok_or_else(|| {
            format!("celebrityName {celebrity_name:?} cannot be used as a file name")
        })?;

        Ok(ValidatedRequest {
            celebrity_name,
            title: field(&self.title),
            description: field(&self.description),
            custom_script: field(&self.custom_script),
            file_name,
        })
    }
}

impl From<&VideoRecord> for GenerateVideoRequest {
    fn from(record: &VideoRecord) -> Self {
        Self {
            celebrity_name: Some(record.celebrity_name.clone()),
            title: Some(record.title.clone()),
            description: Some(record.description.clone()),
            custom_script: Some(record.custom_script.clone()),
            video_url: Some(record.video_url.clone()),
        }
    }
}

impl ValidatedRequest {
    fn to_record(&self, id: String, video_url: &str) -> VideoRecord {
        VideoRecord {
            id,
            celebrity_name: self.celebrity_name.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            custom_script: self.custom_script.clone(),
            video_url: video_url.to_string(),
        }
    }
}

fn field(value: &Option<String>) -> String {
    value.as_deref().unwrap_or_default().trim().to_string()
}

/// Lowercases the trimmed name and turns each space into `-`, the same rule
/// the renderer uses for its output file.
pub fn slugify(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "-")
}

/// `serena-williams-history.mp4` for `Serena Williams`. `None` when the name
/// is blank or carries a path separator or control character.
pub fn video_file_name(celebrity_name: &str) -> Option<String> {
    let slug = slugify(celebrity_name);
    if slug.is_empty() || slug.chars().any(|c| matches!(c, '/' | '\\') || c.is_control()) {
        return None;
    }
    Some(format!("{slug}{VIDEO_FILE_SUFFIX}"))
}

/// Case-insensitive substring search over name, title and description.
/// A blank query returns the whole list.
pub fn filter_videos(query: &str, videos: &[VideoRecord]) -> Vec<VideoRecord> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return videos.to_vec();
    }
    videos
        .iter()
        .filter(|v| {
            [&v.celebrity_name, &v.title, &v.description]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}
