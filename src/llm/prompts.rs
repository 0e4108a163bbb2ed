// Prompts for the plant-care advisor

use chrono::NaiveDate;

use crate::models::{Notebook, PlantTemplate};
use crate::progress::elapsed_days;

pub const ADVICE_SYSTEM_PROMPT: &str = "Bạn là chuyên gia nông nghiệp đô thị, hướng dẫn người trồng cây tại nhà ở Việt Nam. \
Trả lời bằng tiếng Việt, ngắn gọn và thực tế. \
Chỉ trả về JSON với dạng {\"summary\": string, \"tips\": string[], \"warnings\": string[]}.";

/// User prompt describing where the notebook stands today
pub fn advice_prompt(
    notebook: &Notebook,
    template: &PlantTemplate,
    today: NaiveDate,
    question: Option<&str>,
) -> String {
    let day = elapsed_days(notebook.planted_date, today);
    let mut prompt = format!(
        "Cây: {}\nSổ tay: {}\nNgày gieo trồng: {} (hôm nay là ngày thứ {})\n",
        template.plant_name,
        notebook.notebook_name,
        notebook.planted_date.format("%d/%m/%Y"),
        day + 1
    );

    match template.stage(notebook.current_stage) {
        Some(stage) => {
            prompt.push_str(&format!(
                "Giai đoạn hiện tại: {}/{} - {} (ngày {} đến {})\n",
                stage.stage_number,
                template.stage_count(),
                stage.name,
                stage.day_start + 1,
                stage.day_end + 1
            ));
            prompt.push_str(&format!("Tiến độ tổng thể: {:.0}%\n", notebook.progress));
            if !stage.daily_tasks.is_empty() {
                let tasks: Vec<&str> = stage.daily_tasks.iter().map(|t| t.task_name.as_str()).collect();
                prompt.push_str(&format!("Công việc của giai đoạn: {}\n", tasks.join(", ")));
            }
            if let Some(tracking) = notebook.tracking(stage.stage_number) {
                let seen: Vec<String> = tracking
                    .observations
                    .iter()
                    .map(|o| format!("{}={}", o.key, if o.value { "có" } else { "chưa" }))
                    .collect();
                if !seen.is_empty() {
                    prompt.push_str(&format!("Quan sát đã ghi: {}\n", seen.join(", ")));
                }
            }
            let missed: usize = notebook
                .daily_logs
                .iter()
                .filter(|l| l.stage_number == stage.stage_number && day > l.day)
                .map(|l| l.outstanding_items().count())
                .sum();
            if missed > 0 {
                prompt.push_str(&format!("Số công việc bị bỏ lỡ trong giai đoạn: {}\n", missed));
            }
        }
        None => prompt.push_str("Sổ tay đã hoàn thành tất cả các giai đoạn.\n"),
    }

    match question.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => prompt.push_str(&format!("\nCâu hỏi của người trồng: {}\n", q)),
        None => prompt.push_str("\nHãy đưa ra lời khuyên chăm sóc cho giai đoạn này.\n"),
    }
    prompt
}
