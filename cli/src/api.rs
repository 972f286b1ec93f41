use crate::{
    mood::Mood,
    types::{
        AddMoodRequest, DeleteMoodsRequest, MoodPayload, MoodRecord, MoodsResponse,
        SavedMoodsResponse, UpdateDayRequest,
    },
    week::{day_bounds, start_of_today, Week},
};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use indexmap::IndexMap;
use reqwest::{Request, Response, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

const DEFAULT_BASE_URL: &str = "http://localhost:5000/api/moods/";

#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
}

impl Client {
    pub fn new(base_url: Option<&str>) -> Result<Self> {
        let url = parse_base_url(base_url.unwrap_or(DEFAULT_BASE_URL))?;
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .cookie_store(true)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, base_url: url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Records `mood` against the start of the local day.
    pub async fn add_mood(&self, mood: Mood) -> Result<MoodRecord> {
        let request = AddMoodRequest { mood: MoodPayload::from(mood), date: start_of_today() };
        let response = self
            .http
            .post(self.endpoint("add")?)
            .json(&request)
            .send()
            .await
            .context("add mood request failed")?;

        #[derive(Deserialize)]
        struct Added {
            mood: MoodRecord,
        }
        let added: Added = decode(response, "add mood").await?;
        Ok(added.mood)
    }

    pub async fn today_moods(&self) -> Result<Vec<MoodRecord>> {
        let response =
            self.http.get(self.endpoint("today")?).send().await.context("today request failed")?;
        let body: MoodsResponse = decode(response, "today's moods").await?;
        Ok(body.moods)
    }

    pub async fn moods_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MoodRecord>> {
        let url = self.range_url(start, end)?;
        let response = self.http.get(url).send().await.context("range request failed")?;
        let body: MoodsResponse = decode(response, "moods in range").await?;
        Ok(body.moods)
    }

    /// Fetches each day of `week` separately, keyed Monday to Sunday.
    pub async fn week_moods(&self, week: Week) -> Result<IndexMap<NaiveDate, Vec<MoodRecord>>> {
        let mut days = IndexMap::new();
        for day in week.days() {
            let (start, end) = day_bounds(day.date);
            let records = self
                .moods_in_range(start, end)
                .await
                .with_context(|| format!("failed to load moods for {}", day.label()))?;
            debug!(date = %day.date, count = records.len(), "loaded day");
            days.insert(day.date, records);
        }
        Ok(days)
    }

    /// Replaces every mood recorded on the day starting at `date`.
    pub async fn update_day_moods(
        &self,
        date: DateTime<Utc>,
        moods: &[Mood],
    ) -> Result<Vec<MoodRecord>> {
        let request = self.update_day_request(date, moods)?;
        let response = self.http.execute(request).await.context("update day request failed")?;
        let body: SavedMoodsResponse = decode(response, "day update").await?;
        Ok(body.saved_moods)
    }

    pub async fn delete_moods(&self, ids: Vec<String>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let request = self.delete_request(ids)?;
        let response = self.http.execute(request).await.context("delete request failed")?;
        check_status(response, "delete moods").await?;
        Ok(())
    }

    fn update_day_request(&self, date: DateTime<Utc>, moods: &[Mood]) -> Result<Request> {
        let body = UpdateDayRequest {
            date,
            moods: moods.iter().copied().map(MoodPayload::from).collect(),
        };
        self.http
            .put(self.endpoint("day")?)
            .json(&body)
            .build()
            .context("failed to build update day request")
    }

    fn delete_request(&self, ids: Vec<String>) -> Result<Request> {
        self.http
            .delete(self.endpoint("delete")?)
            .json(&DeleteMoodsRequest { mood_ids: ids })
            .build()
            .context("failed to build delete request")
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).with_context(|| format!("failed to build {path} URL"))
    }

    fn range_url(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Url> {
        let mut url = self.endpoint("range")?;
        url.query_pairs_mut()
            .append_pair("start", &start.to_rfc3339_opts(SecondsFormat::Millis, true))
            .append_pair("end", &end.to_rfc3339_opts(SecondsFormat::Millis, true));
        Ok(url)
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let normalized =
        if trimmed.ends_with('/') { trimmed.to_string() } else { format!("{trimmed}/") };
    Url::parse(&normalized).with_context(|| format!("invalid journal base URL `{raw}`"))
}

async fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        bail!("{what} failed: session expired, please sign in again");
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let detail = body.trim();
        if detail.is_empty() {
            bail!("{what} failed with status {status}");
        }
        bail!("{what} failed with status {status}: {detail}");
    }
    Ok(response)
}

async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    let response = check_status(response, what).await?;
    response.json::<T>().await.with_context(|| format!("failed to decode {what} response"))
}
