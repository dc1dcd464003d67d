//! The fixed set of JDF tickets an item can generate and the actions that
//! can be triggered over HTTP. Names arriving from a URL are parsed into
//! these enums; anything else never reaches an item.

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::models::job::{Item, COLOR_KEYS_TICKET};
use crate::services::jdf::{ItemJdf, TaskNode};

const SOURCE_FILE_LIST: &str = "SourceFileList";

/// Ticket generators (`/xml/jdf/gen/...`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum JdfTicket {
    FsbColorkeys,
    FsbProof,
    FlexproofFsbProof,
    FlexproofFsbProofManual,
    CartonContractProof,
    TiffToPdf,
    FsbFfo,
    BevWorkflow,
}

/// Actions that generate a ticket and drop it in the hotfolder
/// (`/xml/jdf/run/...`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum JdfAction {
    FsbColorkeys,
    FsbProof,
    FsbProofFlexproof,
    FsbProofFlexproofManual,
    CartonContractProof,
    TiffToPdf,
    FsbFfo,
    BevWorkflow,
}

impl JdfAction {
    pub fn ticket(self) -> JdfTicket {
        match self {
            JdfAction::FsbColorkeys => JdfTicket::FsbColorkeys,
            // Flexproof has been the default proofing workflow since 2010.
            JdfAction::FsbProof | JdfAction::FsbProofFlexproof => JdfTicket::FlexproofFsbProof,
            JdfAction::FsbProofFlexproofManual => JdfTicket::FlexproofFsbProofManual,
            JdfAction::CartonContractProof => JdfTicket::CartonContractProof,
            JdfAction::TiffToPdf => JdfTicket::TiffToPdf,
            JdfAction::FsbFfo => JdfTicket::FsbFfo,
            JdfAction::BevWorkflow => JdfTicket::BevWorkflow,
        }
    }
}

/// Everything a ticket needs besides the item itself.
#[derive(Debug, Clone, Default)]
pub struct TicketInputs {
    /// Final file resolved through JobStorage.
    pub job_storage_url: String,
    /// `path_to_file` of items stepped with this one.
    pub step_children: Vec<String>,
    /// `file://` URLs of the item's 1-bit tiffs.
    pub tiff_urls: Vec<String>,
}

impl JdfTicket {
    /// Whether building this ticket needs the stepped children.
    pub fn needs_step_children(self) -> bool {
        matches!(self, JdfTicket::FsbFfo)
    }

    /// Whether building this ticket needs the tiff listing.
    pub fn needs_tiffs(self) -> bool {
        matches!(self, JdfTicket::TiffToPdf)
    }

    pub fn build(self, item: &Item, inputs: &TicketInputs) -> ItemJdf {
        let job_id = item.job_id;
        let num = item.num_in_job;
        let own_file = || vec![item.path_to_file.clone()];
        let storage_file = || vec![inputs.job_storage_url.clone()];

        match self {
            JdfTicket::FsbColorkeys => {
                let mut jdf = ItemJdf::new(job_id, num, SOURCE_FILE_LIST, storage_file());
                jdf.add_task_node(TaskNode::new(
                    "RIP1up",
                    "n0001",
                    "TaskParamLink",
                    &format!("/swft/{}", COLOR_KEYS_TICKET),
                    "TIFFList",
                ));
                jdf
            }
            JdfTicket::FsbProof => {
                let mut jdf = ItemJdf::new(job_id, num, SOURCE_FILE_LIST, own_file());
                let rip_ticket = format!("/fripfile_s.file_sModel1.grx/{}", item.fsb_proof_ticket());
                jdf.add_task_node(
                    TaskNode::new("RIP1up", "n0001", "TaskParamLink", &rip_ticket, "TIFFList")
                        .with_smartmark_set("!QuickApproval-Master"),
                );
                jdf.add_task_node(TaskNode::new(
                    "RGB PDF",
                    "n0002",
                    "PDFLink",
                    "/batchbrix.pdfout/AutosavePDF",
                    "PDFFileList",
                ));
                jdf.add_task_node(TaskNode::new(
                    "RGB PDF",
                    "n0003",
                    "JPGLink",
                    "/LINKEDGETASK/FSB_JPG for Rendering",
                    "JPGFileList",
                ));
                jdf
            }
            JdfTicket::FlexproofFsbProof => {
                let mut jdf = ItemJdf::new(job_id, num, SOURCE_FILE_LIST, own_file());
                jdf.add_task_node(TaskNode::new(
                    "RIP1up",
                    "n0001",
                    "TaskParamLink",
                    "/swft/FSB Smart Contract Proofing",
                    "TIFFList",
                ));
                jdf
            }
            JdfTicket::FlexproofFsbProofManual => {
                let mut jdf = ItemJdf::new(job_id, num, SOURCE_FILE_LIST, storage_file());
                jdf.add_task_node(TaskNode::new(
                    "RIP1up",
                    "n0001",
                    "TaskParamLink",
                    "/swft/FSB Smart Manual Proofing",
                    "TIFFList",
                ));
                jdf
            }
            JdfTicket::CartonContractProof => {
                let mut jdf = ItemJdf::new(job_id, num, SOURCE_FILE_LIST, storage_file());
                jdf.add_task_node(TaskNode::new(
                    "RIP1up",
                    "n0001",
                    "TaskParamLink",
                    "/swft/Carton Smart Proofing",
                    "TIFFList",
                ));
                jdf
            }
            JdfTicket::TiffToPdf => {
                let mut jdf =
                    ItemJdf::new(job_id, num, SOURCE_FILE_LIST, inputs.tiff_urls.clone());
                jdf.add_task_node(TaskNode::new(
                    "RGB PDF",
                    "n0001",
                    "TIFFLink",
                    "/swft/BeverageTiffToPDF",
                    "PDFFileList",
                ));
                jdf
            }
            JdfTicket::FsbFfo => {
                // A master item carries all of its stepped children along.
                let mut files = own_file();
                files.extend(inputs.step_children.iter().cloned());
                let mut jdf = ItemJdf::new(job_id, num, SOURCE_FILE_LIST, files)
                    .with_extra_var("PreppedFileList", &[("Status", "Unavailable")])
                    .with_extra_var("PLAFileList", &[("Status", "Unavailable")])
                    .with_extra_var("TIFFList", &[("Status", "Unavailable")]);
                jdf.add_task_node(TaskNode::new(
                    "Workflow",
                    "n0001",
                    "SmartStepRIP",
                    "/swft/FSB Smart Step and RIP",
                    "FSBSmartStepRIP",
                ));
                jdf
            }
            JdfTicket::BevWorkflow => {
                let mut jdf = ItemJdf::new(job_id, num, SOURCE_FILE_LIST, own_file())
                    .with_extra_var("PLAFileList", &[("Status", "Unavailable")])
                    .with_extra_var("TIFFList", &[("Status", "Unavailable")]);
                if item.jdf_no_step {
                    jdf.add_task_node(TaskNode::new(
                        "Beverage Smart RIP",
                        "n0001",
                        "PLALink",
                        "/swft/Beverage Smart RIP",
                        "TIFFList",
                    ));
                } else {
                    jdf.add_task_node(TaskNode::new(
                        "Beverage Smart StepRIP",
                        "n0001",
                        "uplink",
                        "/swft/Beverage Smart Step and RIP",
                        "PLAFileList",
                    ));
                }
                jdf
            }
        }
    }
}
