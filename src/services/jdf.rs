use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::path::{Path, PathBuf};

const JDF_ROOT_NS: &str = "http://www.CIP4.org/JDFSchema_1_2";
const JDF_TASK_NS: &str = "http://www.CIP4.org/JDFSchema_1_1";
const ESKO_NS: &str = "http://www.esko-graphics.com/EGschema1_0";

/// One Backstage / Automation Engine task inside a JDF process group.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskNode {
    pub descriptive_name: String,
    pub node_id: String,
    pub task_id: String,
    pub ticket_name: String,
    pub task_output_id: String,
    pub priority: u32,
    pub task_input_id: String,
    pub task_status: String,
    pub hold: bool,
    pub smartmark_set: Option<String>,
}

impl TaskNode {
    pub fn new(
        descriptive_name: &str,
        node_id: &str,
        task_id: &str,
        ticket_name: &str,
        task_output_id: &str,
    ) -> Self {
        Self {
            descriptive_name: descriptive_name.to_string(),
            node_id: node_id.to_string(),
            task_id: task_id.to_string(),
            ticket_name: ticket_name.to_string(),
            task_output_id: task_output_id.to_string(),
            priority: 50,
            task_input_id: "SourceFileList".to_string(),
            task_status: "Available".to_string(),
            hold: false,
            smartmark_set: None,
        }
    }

    pub fn with_smartmark_set(mut self, smartmark_set: &str) -> Self {
        self.smartmark_set = Some(smartmark_set.to_string());
        self
    }
}

/// A JDF job ticket for one workflow item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemJdf {
    pub job_id: i64,
    pub item_num: i32,
    run_lists: Vec<(String, Vec<String>)>,
    extra_vars: Vec<(String, Vec<(String, String)>)>,
    tasks: Vec<TaskNode>,
}

impl ItemJdf {
    /// Start a document whose resource pool lists `files` under `list_id`
    /// (normally `SourceFileList`).
    pub fn new(job_id: i64, item_num: i32, list_id: &str, files: Vec<String>) -> Self {
        Self {
            job_id,
            item_num,
            run_lists: vec![(list_id.to_string(), files)],
            extra_vars: Vec::new(),
            tasks: Vec::new(),
        }
    }

    /// Declare an additional resource pool parameter ahead of time, e.g.
    /// `TIFFList` with `Status="Unavailable"`.
    pub fn with_extra_var(mut self, id: &str, attrs: &[(&str, &str)]) -> Self {
        self.extra_vars.push((
            id.to_string(),
            attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ));
        self
    }

    pub fn add_task_node(&mut self, task: TaskNode) {
        self.tasks.push(task);
    }

    pub fn tasks(&self) -> &[TaskNode] {
        &self.tasks
    }

    pub fn source_files(&self) -> impl Iterator<Item = &str> {
        self.run_lists
            .iter()
            .flat_map(|(_, files)| files.iter().map(String::as_str))
    }

    /// Serialize the document without indentation, as the hotfolder expects.
    pub fn to_xml(&self) -> Result<String, JdfError> {
        let mut writer = Writer::new(Vec::new());

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let root = BytesStart::new("JDF").with_attributes([
            ("DescriptiveName", "GOLD JDF Task"),
            ("ID", "n0001"),
            ("Status", "Waiting"),
            ("Type", "ProcessGroup"),
            ("Version", "1.2"),
            ("xmlns", JDF_ROOT_NS),
            ("xmlns:eg", ESKO_NS),
        ]);
        writer.write_event(Event::Start(root))?;

        writer.write_event(Event::Start(BytesStart::new("ResourcePool")))?;
        for (list_id, files) in &self.run_lists {
            let list = BytesStart::new("RunList").with_attributes([
                ("Class", "Parameter"),
                ("ID", list_id.as_str()),
                ("PartIDKeys", "Run"),
                ("Status", "Available"),
            ]);
            writer.write_event(Event::Start(list))?;
            for (idx, file) in files.iter().enumerate() {
                let run = format!("Run{:04}", idx + 1);
                writer.write_event(Event::Start(
                    BytesStart::new("RunList").with_attributes([("Run", run.as_str())]),
                ))?;
                writer.write_event(Event::Start(BytesStart::new("LayoutElement")))?;
                writer.write_event(Event::Empty(
                    BytesStart::new("FileSpec").with_attributes([("URL", file.as_str())]),
                ))?;
                writer.write_event(Event::End(BytesEnd::new("LayoutElement")))?;
                writer.write_event(Event::End(BytesEnd::new("RunList")))?;
            }
            writer.write_event(Event::End(BytesEnd::new("RunList")))?;
        }
        for (id, attrs) in &self.extra_vars {
            let mut var = BytesStart::new("RunList")
                .with_attributes([("Class", "Parameter"), ("ID", id.as_str())]);
            for (k, v) in attrs {
                var.push_attribute((k.as_str(), v.as_str()));
            }
            writer.write_event(Event::Empty(var))?;
        }
        writer.write_event(Event::End(BytesEnd::new("ResourcePool")))?;

        for task in &self.tasks {
            write_task(&mut writer, task)?;
        }

        writer.write_event(Event::End(BytesEnd::new("JDF")))?;

        Ok(String::from_utf8(writer.into_inner())?)
    }
}

fn write_task(writer: &mut Writer<Vec<u8>>, task: &TaskNode) -> Result<(), JdfError> {
    let node = BytesStart::new("JDF").with_attributes([
        ("DescriptiveName", task.descriptive_name.as_str()),
        ("ID", task.node_id.as_str()),
        ("Status", "Waiting"),
        ("Type", "eg:BackStageTask"),
        ("Version", "1.2"),
        ("xmlns", JDF_TASK_NS),
        ("xmlns:eg", ESKO_NS),
    ]);
    writer.write_event(Event::Start(node))?;

    let priority = task.priority.to_string();
    writer.write_event(Event::Empty(
        BytesStart::new("NodeInfo").with_attributes([("JobPriority", priority.as_str())]),
    ))?;

    writer.write_event(Event::Start(BytesStart::new("ResourcePool")))?;
    let params = BytesStart::new("eg:BackStageTaskParams").with_attributes([
        ("Class", "Parameter"),
        ("ID", task.task_id.as_str()),
        ("Status", task.task_status.as_str()),
        ("eg:TicketName", task.ticket_name.as_str()),
        ("eg:Hold", if task.hold { "true" } else { "false" }),
    ]);
    match &task.smartmark_set {
        Some(mark_set) => {
            writer.write_event(Event::Start(params))?;
            writer.write_event(Event::Empty(
                BytesStart::new("eg:FlexRipParam")
                    .with_attributes([("eg:MarkSet", mark_set.as_str())]),
            ))?;
            writer.write_event(Event::End(BytesEnd::new("eg:BackStageTaskParams")))?;
        }
        None => writer.write_event(Event::Empty(params))?,
    }
    writer.write_event(Event::End(BytesEnd::new("ResourcePool")))?;

    writer.write_event(Event::Start(BytesStart::new("ResourceLinkPool")))?;
    writer.write_event(Event::Empty(
        BytesStart::new("eg:BackStageTaskParamsLink")
            .with_attributes([("Usage", "Input"), ("rRef", task.task_id.as_str())]),
    ))?;
    writer.write_event(Event::Empty(
        BytesStart::new("RunListLink")
            .with_attributes([("Usage", "Input"), ("rRef", task.task_input_id.as_str())]),
    ))?;
    writer.write_event(Event::Empty(
        BytesStart::new("RunListLink")
            .with_attributes([("Usage", "Output"), ("rRef", task.task_output_id.as_str())]),
    ))?;
    writer.write_event(Event::End(BytesEnd::new("ResourceLinkPool")))?;

    writer.write_event(Event::End(BytesEnd::new("JDF")))?;
    Ok(())
}

/// Result of dropping a ticket into the hotfolder.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Written(PathBuf),
    /// A file with the same name is still waiting to be picked up.
    Duplicate(PathBuf),
}

/// The drop directory polled by Automation Engine / Backstage.
#[derive(Debug, Clone)]
pub struct HotFolder {
    root: PathBuf,
}

impl HotFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<job_id>-<item_num>-<DD_MM-HH_MM_SS>.jdf`
    pub fn file_name(job_id: i64, item_num: i32, at: DateTime<Utc>) -> String {
        format!("{}-{}-{}.jdf", job_id, item_num, at.format("%d_%m-%H_%M_%S"))
    }

    /// `<job>-<item>` from a ticket file name. Names with fewer than two
    /// dash-separated segments are used whole.
    pub fn duplicate_pattern(file_name: &str) -> String {
        let mut parts = file_name.split('-');
        match (parts.next(), parts.next()) {
            (Some(job), Some(item)) => format!("{}-{}", job, item),
            _ => file_name.to_string(),
        }
    }

    /// Files in the drop directory matching `<pattern>*`. This is a plain
    /// prefix match, so a waiting ticket for item 10 also holds back item 1.
    pub async fn pending_matches(&self, pattern: &str) -> Result<Vec<PathBuf>, JdfError> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(JdfError::Io(e)),
        };

        let mut matches = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with(pattern) {
                matches.push(entry.path());
            }
        }
        matches.sort();
        Ok(matches)
    }

    /// Write the ticket under a timestamped name.
    pub async fn send(&self, jdf: &ItemJdf, at: DateTime<Utc>) -> Result<SendOutcome, JdfError> {
        let file_name = Self::file_name(jdf.job_id, jdf.item_num, at);
        self.send_as(jdf, &file_name).await
    }

    /// Write the ticket under `file_name` unless that exact file is still
    /// waiting in the drop directory.
    pub async fn send_as(&self, jdf: &ItemJdf, file_name: &str) -> Result<SendOutcome, JdfError> {
        let path = self.root.join(file_name);
        if tokio::fs::try_exists(&path).await? {
            tracing::warn!(
                job_id = jdf.job_id,
                item_num = jdf.item_num,
                file = %path.display(),
                "Too many JDF tasks launched back-to-back on this item, only the first will run"
            );
            metrics::counter!("jdf_duplicate_drops_total").increment(1);
            return Ok(SendOutcome::Duplicate(path));
        }

        let xml = jdf.to_xml()?;
        tokio::fs::write(&path, xml).await?;
        metrics::counter!("jdf_tickets_written_total").increment(1);

        tracing::info!(
            job_id = jdf.job_id,
            item_num = jdf.item_num,
            file = %path.display(),
            "JDF ticket written"
        );
        Ok(SendOutcome::Written(path))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JdfError {
    #[error("XML write failed: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("Hotfolder I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
