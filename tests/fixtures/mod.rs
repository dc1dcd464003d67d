//! Jobs and items shared by the router tests.

use gold_workflow::models::job::{Item, Job};

pub const JOB_ID: i64 = 49297;
pub const JOB_NAME: &str = "SMRE_12 SD";

pub struct TestItemFixture {
    pub id: i64,
    pub num_in_job: i32,
    pub file_name: &'static str,
    pub bev_item_name: Option<&'static str>,
}

pub const TEST_ITEMS: &[TestItemFixture] = &[
    TestItemFixture {
        id: 1,
        num_in_job: 1,
        file_name: "49297-1 SMRE-12.pdf",
        bev_item_name: Some("SMRE-12"),
    },
    TestItemFixture {
        id: 2,
        num_in_job: 2,
        file_name: "49297-2 SMRE-16.pdf",
        bev_item_name: None,
    },
];

pub fn job() -> Job {
    Job {
        id: JOB_ID,
        name: JOB_NAME.to_string(),
    }
}

impl TestItemFixture {
    pub fn item(&self) -> Item {
        Item {
            id: self.id,
            job_id: JOB_ID,
            num_in_job: self.num_in_job,
            path_to_file: format!("/Volumes/Jobs/{} {}/Final_Files/{}", JOB_ID, JOB_NAME, self.file_name),
            bev_item_name: self.bev_item_name.map(str::to_string),
            product_substrate: Some("Paper".to_string()),
            press_name: Some("Kidder".to_string()),
            plate_type: Some("Digital".to_string()),
            jdf_no_step: false,
            steps_with: None,
        }
    }
}
