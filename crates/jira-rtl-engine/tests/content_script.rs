//! A page session end to end, wired from the default configuration.

use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use jira_rtl_config::{ExtensionSettings, JiraRtlConfig, MemorySettingsStore, SettingsStore};
use jira_rtl_dom::{Document, Selector, Window};
use jira_rtl_engine::LifecycleController;
use tokio::task::{self, LocalSet};

#[tokio::test(start_paused = true)]
async fn jira_page_session() -> Result<()> {
    LocalSet::new()
        .run_until(async {
            let doc = Document::parse_html(
                r#"<div class="ak-renderer-document"><p id="comment">hello</p></div>"#,
            )
            .into_shared();
            let window = Rc::new(Window::new(
                doc.clone(),
                "https://acme.atlassian.net/browse/ABC-1",
            )?);
            let store = Rc::new(MemorySettingsStore::default());
            let controller = Rc::new(LifecycleController::from_config(
                window.clone(),
                store.clone(),
                &JiraRtlConfig::default(),
            )?);
            controller.start().await?;
            controller.schedule_post_load_scan();
            let watching = task::spawn_local({
                let controller = controller.clone();
                async move { controller.watch_settings().await }
            });

            // A comment rendered after navigating to another issue.
            let comment = {
                let doc = doc.borrow();
                doc.query_selector(doc.root(), &Selector::parse("#comment")?)
            };
            let comment = comment.ok_or_else(|| anyhow::anyhow!("comment missing"))?;
            window.push_state("/browse/ABC-2")?;
            doc.borrow_mut().set_text_content(comment, "תגובה חדשה")?;
            tokio::time::sleep(Duration::from_millis(250)).await;
            assert_eq!(
                doc.borrow().attribute(comment, "data-jira-rtl-applied"),
                Some("true")
            );

            store.save(ExtensionSettings { enabled: false }).await?;
            tokio::time::sleep(Duration::from_millis(5000)).await;
            assert!(!doc.borrow().has_attribute(comment, "data-jira-rtl-applied"));
            assert!(!window.has_history_hook());

            watching.abort();
            anyhow::Ok(())
        })
        .await
}
